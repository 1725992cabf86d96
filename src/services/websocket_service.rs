use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        events::{COMMAND_RESULT_EVENT, ServerEvent},
        ws::{ClientMessage, CommandResult, ControlMatchRequest},
    },
    services::{broadcast_service, control_service},
    state::{SharedState, access::Role},
};

/// Handle the full lifecycle of a viewer or referee WebSocket connection.
///
/// The connection receives the current snapshot right away, then every broadcast.
/// Control commands are acknowledged to this connection only.
pub async fn handle_socket(state: SharedState, socket: WebSocket, role: Role) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Subscribe before taking the snapshot so no update falls between the two.
    let mut updates = state.viewers().subscribe();
    info!(role = ?role, "websocket client connected");

    if !send_snapshot(&state, &outbound_tx).await {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(event) => {
                    if !send_event(&outbound_tx, &event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket client lagged; resending snapshot");
                    if !send_snapshot(&state, &outbound_tx).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_text(&state, &role, text.as_str()).await
                        && !send_event(&outbound_tx, &reply)
                    {
                        break;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = outbound_tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = outbound_tx.send(Message::Close(frame));
                    break;
                }
                Some(Ok(Message::Binary(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "websocket error");
                    break;
                }
                None => break,
            },
        }
    }

    info!(role = ?role, "websocket client disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Process one inbound text frame, returning the acknowledgement to send back.
///
/// Frames that cannot be parsed are logged and dropped without a reply.
pub async fn handle_text(state: &SharedState, role: &Role, text: &str) -> Option<ServerEvent> {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "ignoring malformed websocket message");
            return None;
        }
    };

    let ClientMessage::ControlMatch(request) = message;
    let result = control(state, role, &request).await;
    match ServerEvent::json(COMMAND_RESULT_EVENT, &result) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize command result");
            None
        }
    }
}

async fn control(state: &SharedState, role: &Role, request: &ControlMatchRequest) -> CommandResult {
    let (match_id, command) = match request.parse(state.config().rules()) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(action = %request.action, error = %err, "rejected control command");
            return CommandResult::rejected(request, err);
        }
    };

    match control_service::execute(state, role, match_id, command).await {
        Ok(_) => CommandResult::accepted(request),
        Err(err) => {
            warn!(match_id = %match_id, action = %request.action, error = %err, "rejected control command");
            CommandResult::rejected(request, err)
        }
    }
}

async fn send_snapshot(state: &SharedState, tx: &mpsc::UnboundedSender<Message>) -> bool {
    match broadcast_service::all_matches_event(state).await {
        Some(event) => send_event(tx, &event),
        None => true,
    }
}

/// Queue an event on the writer; `false` once the connection is gone.
fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &ServerEvent) -> bool {
    match event.ws_text() {
        Ok(text) => tx.send(Message::Text(text.into())).is_ok(),
        Err(err) => {
            warn!(error = %err, event = %event.event, "failed to serialize websocket event");
            true
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::test_support::FlakyStore,
        dto::events::ALL_MATCHES_EVENT,
        state::{
            AppState,
            matches::{Match, MatchRules},
        },
    };

    async fn state_with_match() -> (SharedState, Match) {
        let state = AppState::new(AppConfig::default());
        state.install_match_store(Arc::new(FlakyStore::new())).await;
        let mut record = Match::new(
            "sumo".into(),
            "FINAL".into(),
            "school".into(),
            None,
            &MatchRules::default(),
            SystemTime::now(),
        );
        record.competitor_a = Some(Uuid::new_v4());
        record.competitor_b = Some(Uuid::new_v4());
        state.commit_matches([record.clone()]).await;
        (state, record)
    }

    fn frame(match_id: &str, action: &str) -> String {
        json!({
            "event": "control_match",
            "data": { "matchId": match_id, "action": action }
        })
        .to_string()
    }

    #[tokio::test]
    async fn accepted_command_is_acknowledged_and_broadcast() {
        let (state, record) = state_with_match().await;
        let mut rx = state.viewers().subscribe();

        let reply = handle_text(&state, &Role::Admin, &frame(&record.id.to_string(), "START"))
            .await
            .unwrap();
        assert_eq!(reply.event, COMMAND_RESULT_EVENT);
        assert_eq!(reply.data["accepted"], true);

        assert_eq!(rx.recv().await.unwrap().event, ALL_MATCHES_EVENT);
        assert!(state.find_match(record.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn rejections_reach_only_the_sender() {
        let (state, record) = state_with_match().await;
        let mut rx = state.viewers().subscribe();

        let reply = handle_text(&state, &Role::Admin, &frame(&Uuid::new_v4().to_string(), "START"))
            .await
            .unwrap();
        assert_eq!(reply.data["accepted"], false);

        let reply = handle_text(&state, &Role::Admin, &frame(&record.id.to_string(), "JUMP"))
            .await
            .unwrap();
        assert_eq!(reply.data["accepted"], false);
        assert!(reply.data["reason"].as_str().unwrap().contains("JUMP"));

        let reply = handle_text(&state, &Role::Viewer, &frame(&record.id.to_string(), "START"))
            .await
            .unwrap();
        assert_eq!(reply.data["accepted"], false);

        assert!(rx.try_recv().is_err());
        assert!(!state.find_match(record.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let (state, _record) = state_with_match().await;
        assert!(handle_text(&state, &Role::Admin, "not json").await.is_none());
        assert!(
            handle_text(&state, &Role::Admin, r#"{"event":"dance","data":{}}"#)
                .await
                .is_none()
        );
    }
}
