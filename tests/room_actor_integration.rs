//! Room actor and registry behavior over channels, the way a transport
//! drives them.

use std::time::Duration;

use holdem_rooms::room::messages::{HandSummaryView, RoomMessage, RoomResult, RoomStateView};
use holdem_rooms::{PlayerAction, PlayerId, Role, RoomHandle, RoomRegistry, RoomSettings};
use tokio::sync::oneshot;
use tokio::time::sleep;

fn cash_settings() -> RoomSettings {
    RoomSettings {
        allow_straddle: false,
        ..RoomSettings::default()
    }
}

async fn get_state(handle: &RoomHandle, viewer: PlayerId) -> RoomStateView {
    let (tx, rx) = oneshot::channel();
    assert!(
        handle
            .send(RoomMessage::GetState {
                viewer_id: viewer,
                reply: tx
            })
            .await
    );
    rx.await.unwrap()
}

async fn join_player(handle: &RoomHandle, name: &str) -> PlayerId {
    let id = PlayerId::new();
    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::Join {
            member_id: id,
            name: name.to_string(),
            passphrase: None,
            spectator: false,
            reply: tx,
        })
        .await;
    assert_eq!(rx.await.unwrap().unwrap(), Role::Player);
    id
}

async fn take_action(
    handle: &RoomHandle,
    member_id: PlayerId,
    action: PlayerAction,
) -> RoomResult<()> {
    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::TakeAction {
            member_id,
            action,
            reply: tx,
        })
        .await;
    rx.await.unwrap()
}

async fn start_hand(handle: &RoomHandle, member_id: PlayerId) -> RoomResult<()> {
    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::StartHand {
            member_id,
            reply: tx,
        })
        .await;
    rx.await.unwrap()
}

#[tokio::test]
async fn create_join_and_play_a_hand_over_channels() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (room_id, handle) = registry
        .create_room(host, "alice", "channel game", None, cash_settings())
        .await
        .unwrap();
    assert_eq!(room_id.len(), 6);

    let bob = join_player(&handle, "bob").await;
    start_hand(&handle, host).await.unwrap();

    let state = get_state(&handle, host).await;
    let game = state.game.expect("hand should be live");
    assert!(!game.finished);
    let turn = game.turn_id.unwrap();

    // Heads-up: dealer folds, the blind wins uncontested.
    take_action(&handle, turn, PlayerAction::Fold).await.unwrap();
    let state = get_state(&handle, bob).await;
    let game = state.game.unwrap();
    assert!(game.finished);
    assert!(game.result.is_some());
}

#[tokio::test]
async fn acting_out_of_turn_is_rejected_through_the_actor() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (_, handle) = registry
        .create_room(host, "alice", "strict", None, cash_settings())
        .await
        .unwrap();
    join_player(&handle, "bob").await;
    let carol = join_player(&handle, "carol").await;
    start_hand(&handle, host).await.unwrap();

    let state = get_state(&handle, host).await;
    let turn = state.game.unwrap().turn_id.unwrap();
    let off_turn = if turn == carol { host } else { carol };
    assert!(take_action(&handle, off_turn, PlayerAction::Fold).await.is_err());
    assert!(take_action(&handle, turn, PlayerAction::Fold).await.is_ok());
}

#[tokio::test]
async fn registry_lists_rooms_idle_first() {
    let registry = RoomRegistry::new();
    let a = PlayerId::new();
    let b = PlayerId::new();
    let (busy_id, busy) = registry
        .create_room(a, "alice", "busy room", None, cash_settings())
        .await
        .unwrap();
    registry
        .create_room(b, "bob", "idle room", None, cash_settings())
        .await
        .unwrap();

    join_player(&busy, "guest").await;
    start_hand(&busy, a).await.unwrap();

    let lobby = registry.lobby().await;
    assert_eq!(lobby.len(), 2);
    assert!(!lobby[0].in_game);
    assert!(lobby[1].in_game);
    assert_eq!(lobby[1].room_id, busy_id);
}

#[tokio::test]
async fn multibyte_names_survive_creation_and_join() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let long_room_name = "德州扑克".repeat(10);
    let (_, handle) = registry
        .create_room(host, "房主玩家", &long_room_name, None, cash_settings())
        .await
        .unwrap();

    let guest = join_player(&handle, "德州扑克玩家").await;
    let state = get_state(&handle, guest).await;
    assert_eq!(state.room_name.chars().count(), 24);
    let seat = state.players.iter().find(|p| p.id == guest).unwrap();
    assert_eq!(seat.name, "德州扑克玩家");
}

#[tokio::test]
async fn lookup_is_case_insensitive_and_misses_are_none() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (room_id, _) = registry
        .create_room(host, "alice", "findme", None, cash_settings())
        .await
        .unwrap();
    assert!(registry.get(&room_id.to_lowercase()).await.is_some());
    assert!(registry.get("NOPE99").await.is_none());
}

#[tokio::test]
async fn room_actor_exits_when_the_last_member_leaves() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (_, handle) = registry
        .create_room(host, "alice", "short lived", None, cash_settings())
        .await
        .unwrap();

    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::Leave {
            member_id: host,
            reply: tx,
        })
        .await;
    rx.await.unwrap();

    // The actor drains its inbox and stops once the room is empty.
    for _ in 0..50 {
        if handle.is_closed() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(handle.is_closed());

    registry.purge_closed().await;
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn passphrase_rooms_reject_wrong_guesses() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (_, handle) = registry
        .create_room(host, "alice", "private", Some("hunter2"), cash_settings())
        .await
        .unwrap();

    let guest = PlayerId::new();
    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::Join {
            member_id: guest,
            name: "guest".to_string(),
            passphrase: Some("wrong".to_string()),
            spectator: false,
            reply: tx,
        })
        .await;
    assert!(rx.await.unwrap().is_err());

    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::Join {
            member_id: guest,
            name: "guest".to_string(),
            passphrase: Some("hunter2".to_string()),
            spectator: false,
            reply: tx,
        })
        .await;
    assert!(rx.await.unwrap().is_ok());

    let state = get_state(&handle, guest).await;
    assert!(state.has_passphrase);
}

#[tokio::test]
async fn next_hand_auto_starts_after_the_delay() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (_, handle) = registry
        .create_room(host, "alice", "auto", None, cash_settings())
        .await
        .unwrap();
    join_player(&handle, "bob").await;
    start_hand(&handle, host).await.unwrap();

    let state = get_state(&handle, host).await;
    let first = state.game.as_ref().unwrap().hand_no;
    let turn = state.game.unwrap().turn_id.unwrap();
    take_action(&handle, turn, PlayerAction::Fold).await.unwrap();

    let state = get_state(&handle, host).await;
    assert!(state.auto_start_at.is_some());

    // The auto-start clock fires about 2.2s after settlement.
    sleep(Duration::from_millis(3_500)).await;
    let state = get_state(&handle, host).await;
    let game = state.game.unwrap();
    assert!(!game.finished);
    assert!(game.hand_no > first);
}

#[tokio::test]
async fn hand_history_flows_through_the_actor() {
    let registry = RoomRegistry::new();
    let host = PlayerId::new();
    let (_, handle) = registry
        .create_room(host, "alice", "history", None, cash_settings())
        .await
        .unwrap();
    join_player(&handle, "bob").await;
    start_hand(&handle, host).await.unwrap();

    let turn = get_state(&handle, host).await.game.unwrap().turn_id.unwrap();
    take_action(&handle, turn, PlayerAction::Fold).await.unwrap();

    let (tx, rx) = oneshot::channel();
    handle.send(RoomMessage::GetHandHistory { reply: tx }).await;
    let history: Vec<HandSummaryView> = rx.await.unwrap();
    assert_eq!(history.len(), 1);

    let (tx, rx) = oneshot::channel();
    handle
        .send(RoomMessage::GetHandReplay {
            hand_no: history[0].hand_no,
            reply: tx,
        })
        .await;
    let replay = rx.await.unwrap().unwrap();
    assert_eq!(replay.hand_no, history[0].hand_no);
    assert!(replay.result.is_some());
}
