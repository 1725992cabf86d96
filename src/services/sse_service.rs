use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{dto::events::ServerEvent, services::broadcast_service, state::SharedState};

/// Open a read-only match stream: the current snapshot first, then every broadcast.
pub async fn viewer_stream(
    state: SharedState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before the snapshot so nothing committed in between is missed.
    let mut receiver = state.viewers().subscribe();
    let initial = broadcast_service::all_matches_event(&state).await;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(event) = initial.as_ref().and_then(to_sse_event)
            && tx.send(Ok(event)).await.is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    let payload = match recv_result {
                        Ok(payload) => Some(payload),
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "SSE viewer lagged; resending snapshot");
                            broadcast_service::all_matches_event(&state).await
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if let Some(event) = payload.as_ref().and_then(to_sse_event)
                        && tx.send(Ok(event)).await.is_err()
                    {
                        break;
                    }
                }
            }
        }

        info!("SSE viewer disconnected");
    });

    info!("new SSE viewer connected");
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(payload: &ServerEvent) -> Option<Event> {
    match payload.sse_data() {
        Ok(data) => Some(Event::default().event(payload.event.as_str()).data(data)),
        Err(err) => {
            warn!(error = %err, event = %payload.event, "failed to serialize SSE event");
            None
        }
    }
}
