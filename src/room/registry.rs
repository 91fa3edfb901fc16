//! Process-wide room registry.
//!
//! Owns the map from room id to actor handle. Creating a room hashes the
//! passphrase, picks a unique short id and spawns the actor; the room
//! lives in its own task from then on and the registry only hands out
//! handles.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
use argon2::Argon2;
use log::info;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{RwLock, oneshot};

use crate::game::constants::{
    MAX_ROOM_NAME_LENGTH, ROOM_ID_ALPHABET, ROOM_ID_CREATE_ATTEMPTS, ROOM_ID_LENGTH,
};
use crate::game::entities::PlayerId;
use crate::room::actor::{RoomActor, RoomHandle};
use crate::room::config::RoomSettings;
use crate::room::engine::RoomEngine;
use crate::room::messages::{LobbySummary, RoomMessage};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not allocate a unique room id")]
    IdSpaceExhausted,

    #[error("room not found")]
    RoomNotFound,

    #[error("failed to hash the room passphrase")]
    PassphraseHash,
}

/// Shared handle map. Cloning shares the underlying registry.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
}

fn random_room_id() -> String {
    let mut rng = rand::rng();
    (0..ROOM_ID_LENGTH)
        .map(|_| {
            let i = rng.random_range(0..ROOM_ID_ALPHABET.len());
            ROOM_ID_ALPHABET[i] as char
        })
        .collect()
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with its creator seated as host. Returns the new
    /// room's id and handle.
    pub async fn create_room(
        &self,
        host_id: PlayerId,
        host_name: &str,
        room_name: &str,
        passphrase: Option<&str>,
        settings: RoomSettings,
    ) -> Result<(String, RoomHandle), RegistryError> {
        let passphrase_hash = match passphrase.filter(|p| !p.is_empty()) {
            Some(pass) => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(pass.as_bytes(), &salt)
                    .map_err(|_| RegistryError::PassphraseHash)?;
                Some(hash.to_string())
            }
            None => None,
        };

        let mut rooms = self.rooms.write().await;
        let room_id = Self::unique_id(&rooms)?;

        let mut room_name: String = room_name.trim().chars().take(MAX_ROOM_NAME_LENGTH).collect();
        if room_name.is_empty() {
            room_name = format!("table-{room_id}");
        }

        let engine = RoomEngine::new(
            room_id.clone(),
            room_name,
            passphrase_hash,
            settings,
            host_id,
            host_name,
        );
        let handle = RoomActor::spawn(engine);
        rooms.insert(room_id.clone(), handle.clone());
        info!("created room {room_id}");
        Ok((room_id, handle))
    }

    fn unique_id(rooms: &HashMap<String, RoomHandle>) -> Result<String, RegistryError> {
        for _ in 0..ROOM_ID_CREATE_ATTEMPTS {
            let id = random_room_id();
            if !rooms.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(RegistryError::IdSpaceExhausted)
    }

    /// Look up a live room. Handles whose actor has exited are treated
    /// as absent.
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        let id = room_id.trim().to_uppercase();
        let rooms = self.rooms.read().await;
        rooms.get(&id).filter(|h| !h.is_closed()).cloned()
    }

    /// Summaries of all live rooms, idle rooms first, ties broken by id.
    pub async fn lobby(&self) -> Vec<LobbySummary> {
        let handles: Vec<RoomHandle> = {
            let rooms = self.rooms.read().await;
            rooms.values().filter(|h| !h.is_closed()).cloned().collect()
        };

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let (tx, rx) = oneshot::channel();
            if !handle.send(RoomMessage::GetLobbySummary { reply: tx }).await {
                continue;
            }
            if let Ok(summary) = rx.await {
                summaries.push(summary);
            }
        }
        summaries.sort_by(|a, b| {
            a.in_game
                .cmp(&b.in_game)
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        summaries
    }

    /// Drop handles whose actor has exited.
    pub async fn purge_closed(&self) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, handle| !handle.is_closed());
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
