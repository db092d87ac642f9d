use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dao::{fact_store::FactQuery, facts::FactHash},
    dto::sse::ServerEvent,
    error::ServiceError,
    services::game_service,
    state::SharedState,
};

const GAME_STATE_EVENT: &str = "game_state";

async fn game_state(state: &SharedState, game_id: &FactHash) -> Result<ServerEvent, ServiceError> {
    let payload = game_service::game_state_event(state, game_id).await?;
    ServerEvent::json(Some(GAME_STATE_EVENT.to_string()), &payload)
        .map_err(|err| ServiceError::InvalidState(format!("could not encode game state: {err}")))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Stream the board of a game: once on connect, then after every new move.
///
/// The move watch is registered before the initial snapshot is read so no move can slip
/// between the two.
pub async fn game_stream(
    state: SharedState,
    game_id: FactHash,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    game_service::ensure_game(&state, &game_id).await?;

    let mut subscription = state.store().watch(FactQuery::Moves {
        game: game_id.clone(),
    });
    let initial = game_state(&state, &game_id).await?;

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(initial))).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = subscription.next() => {
                    if next.is_none() {
                        break;
                    }
                    match game_state(&state, &game_id).await {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(game = %game_id, error = %err, "could not refresh game state"),
                    }
                }
            }
        }
        subscription.stop();
        info!(game = %game_id, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
