//! Per-connection handler: frame decoding and outbound delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the protocol loop, receiving an outbound channel
//!   2. Loop: decode inbound frames into events, write outbound messages
//!   3. On close (either side), the guard reports the disconnect
//!
//! The handler owns no game state. Everything it learns goes to the
//! protocol as an [`Event`].

use std::sync::Arc;

use dropfour_protocol::{ClientMessage, Codec, ServerMessage};
use dropfour_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::error::{DropfourError, RequestError};
use crate::event::{Event, EventSender};

/// Reports the disconnect when the handler exits, however it exits.
struct DisconnectGuard {
    conn: ConnectionId,
    events: EventSender,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let _ = self.events.send(Event::Disconnected { conn: self.conn });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    events: EventSender,
    codec: Arc<C>,
) -> Result<(), DropfourError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
    if events
        .send(Event::Connected {
            conn: conn_id,
            outbound,
        })
        .is_err()
    {
        tracing::debug!(%conn_id, "protocol loop gone, refusing connection");
        let _ = conn.close().await;
        return Ok(());
    }
    let _guard = DisconnectGuard {
        conn: conn_id,
        events: events.clone(),
    };

    loop {
        tokio::select! {
            frame = conn.recv() => match frame {
                Ok(Some(data)) => match codec.decode::<ClientMessage>(&data) {
                    Ok(message) => {
                        if events.send(Event::Inbound { conn: conn_id, message }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode client message");
                        let reply = RequestError::Malformed(e.to_string()).to_message();
                        send_message(&conn, codec.as_ref(), &reply).await?;
                    }
                },
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(message) => send_message(&conn, codec.as_ref(), &message).await?,
                None => {
                    // The protocol dropped our sender: server shutdown.
                    tracing::debug!(%conn_id, "released by protocol, closing");
                    let _ = conn.close().await;
                    break;
                }
            },
        }
    }

    // _guard drops here → Disconnected fires.
    Ok(())
}

/// Encodes and writes one server message.
async fn send_message(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    message: &ServerMessage,
) -> Result<(), DropfourError> {
    let bytes = codec.encode(message)?;
    conn.send(&bytes).await?;
    Ok(())
}
