//! Per-room actor task.
//!
//! Each room runs as one tokio task owning its [`RoomEngine`]. Intents
//! arrive through an mpsc inbox and are applied strictly in order, which
//! is the whole concurrency story: no locks, no interleaving. The same
//! loop arms the two clocks a room needs, the turn timer of the live
//! hand and the delay before the next hand auto-starts. Timer fires are
//! re-validated against the engine, so a fire racing an action is a
//! no-op.

use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep_until};

use crate::game::constants::TURN_TIMER_SLACK_MS;
use crate::room::engine::RoomEngine;
use crate::room::messages::RoomMessage;

const INBOX_CAPACITY: usize = 64;

/// Cheap cloneable sender side of a room.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    room_id: String,
}

impl RoomHandle {
    /// Deliver a message to the room. Returns false if the room actor
    /// has already shut down.
    pub async fn send(&self, message: RoomMessage) -> bool {
        self.sender.send(message).await.is_ok()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }
}

pub struct RoomActor {
    engine: RoomEngine,
    inbox: mpsc::Receiver<RoomMessage>,
}

fn instant_at(deadline: DateTime<Utc>) -> Instant {
    let remaining = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Instant::now() + remaining
}

impl RoomActor {
    /// Spawn the actor task for an engine and hand back its handle.
    pub fn spawn(engine: RoomEngine) -> RoomHandle {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let room_id = engine.id.clone();
        let actor = Self { engine, inbox };
        tokio::spawn(actor.run());
        RoomHandle { sender, room_id }
    }

    async fn run(mut self) {
        loop {
            // Re-arm both clocks from current state every iteration; a
            // handled message may have moved or cleared either deadline.
            let turn = self.engine.turn_token();
            let turn_at = turn.map(|(_, _, deadline)| {
                instant_at(deadline) + Duration::from_millis(TURN_TIMER_SLACK_MS)
            });
            let auto_at = self.engine.auto_start_deadline().map(instant_at);

            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        None => break,
                        Some(RoomMessage::Close { reply }) => {
                            let _ = reply.send(());
                            break;
                        }
                        Some(message) => self.handle(message),
                    }
                    if self.engine.is_empty() {
                        break;
                    }
                }
                () = sleep_until(turn_at.unwrap_or_else(Instant::now)), if turn_at.is_some() => {
                    let (hand_no, player_id, _) = turn.expect("deadline implies token");
                    self.engine.handle_turn_timeout(hand_no, player_id);
                }
                () = sleep_until(auto_at.unwrap_or_else(Instant::now)), if auto_at.is_some() => {
                    self.engine.try_auto_start();
                }
            }
        }
        info!("room {} shut down", self.engine.id);
    }

    fn handle(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                member_id,
                name,
                passphrase,
                spectator,
                reply,
            } => {
                let _ = reply.send(self.engine.join(
                    member_id,
                    &name,
                    passphrase.as_deref(),
                    spectator,
                ));
            }
            RoomMessage::Leave { member_id, reply } => {
                self.engine.leave(member_id);
                let _ = reply.send(());
            }
            RoomMessage::TakeSeat { member_id, reply } => {
                let _ = reply.send(self.engine.take_seat(member_id));
            }
            RoomMessage::BecomeSpectator { member_id, reply } => {
                let _ = reply.send(self.engine.become_spectator(member_id));
            }
            RoomMessage::ChangeSeat {
                member_id,
                target_id,
                seat,
                reply,
            } => {
                let _ = reply.send(self.engine.change_seat(member_id, target_id, seat));
            }
            RoomMessage::ToggleReady { member_id, reply } => {
                let _ = reply.send(self.engine.toggle_ready(member_id));
            }
            RoomMessage::StartHand { member_id, reply } => {
                let _ = reply.send(self.engine.start_hand(member_id));
            }
            RoomMessage::TakeAction {
                member_id,
                action,
                reply,
            } => {
                let _ = reply.send(self.engine.apply_action(member_id, action));
            }
            RoomMessage::Kick {
                member_id,
                target_id,
                reply,
            } => {
                let _ = reply.send(self.engine.remove_member(member_id, target_id, false));
            }
            RoomMessage::Ban {
                member_id,
                target_id,
                reply,
            } => {
                let _ = reply.send(self.engine.remove_member(member_id, target_id, true));
            }
            RoomMessage::Unban {
                member_id,
                name,
                reply,
            } => {
                let _ = reply.send(self.engine.unban(member_id, &name));
            }
            RoomMessage::GetState { viewer_id, reply } => {
                let _ = reply.send(self.engine.serialize(viewer_id));
            }
            RoomMessage::GetLobbySummary { reply } => {
                let _ = reply.send(self.engine.lobby_summary());
            }
            RoomMessage::GetHandHistory { reply } => {
                let _ = reply.send(self.engine.hand_history_tail());
            }
            RoomMessage::GetHandReplay { hand_no, reply } => {
                let _ = reply.send(self.engine.hand_replay(hand_no));
            }
            RoomMessage::Disconnect { member_id, reply } => {
                self.engine.disconnect(member_id);
                let _ = reply.send(());
            }
            RoomMessage::Reconnect { member_id, reply } => {
                let _ = reply.send(self.engine.reconnect(member_id));
            }
            RoomMessage::Close { .. } => unreachable!("handled in run"),
        }
    }
}
