//! WebSocket endpoint.
//!
//! One task per socket. The task multiplexes two sources with `select!`:
//! inbound frames from the client, handled one at a time by the channel's
//! [`Session`], and outbound frames queued on the channel's handle by this
//! or any other session.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use banca_shared::constants::MAX_FRAME_SIZE;

use crate::api::AppState;
use crate::registry::ChannelHandle;
use crate::session::Session;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| run_channel(socket, state))
}

async fn run_channel(socket: WebSocket, state: AppState) {
    let (channel, mut outbound) = ChannelHandle::open();
    let connection = channel.id();
    let mut session = Session::new(
        channel,
        state.store.clone(),
        state.registry.clone(),
        state.frame_limiter.clone(),
    );

    let (mut sink, mut stream) = socket.split();
    debug!(connection = %connection.short(), "Channel opened");

    loop {
        tokio::select! {
            biased;

            Some(frame) = outbound.recv() => {
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(connection = %connection.short(), error = %e, "Failed to encode frame");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    debug!(connection = %connection.short(), "Socket write failed");
                    break;
                }
            }

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => session.handle_text(&text).await,
                    Some(Ok(WsMessage::Binary(_))) => session.reject("Binary frames are not supported"),
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection = %connection.short(), error = %e, "Socket read failed");
                        break;
                    }
                }
            }
        }
    }

    debug!(connection = %connection.short(), user_id = ?session.user(), "Socket closed");
    session.close().await;
}
