//! Per-connection handler: handshake, then request routing.
//!
//! Each accepted connection gets its own Tokio task running this handler:
//!   1. Receive `Handshake` → check the version, bind the caller address
//!   2. Send `HandshakeAck`
//!   3. Loop: heartbeat and disconnect, or dispatch a request and send
//!      exactly one `Reply` or `Failure` back

use std::sync::Arc;
use std::time::Duration;

use getaway_protocol::{
    Address, Codec, Envelope, Payload, ProtocolError, Request, SystemMessage,
};
use getaway_room::Clock;
use getaway_settlement::SettlementBridge;
use getaway_transport::{Connection, WebSocketConnection};

use crate::GetawayError;
use crate::dispatch::dispatch;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// A client must say something (a heartbeat will do) this often.
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outgoing frames for one connection, numbered in send order.
///
/// Timestamps come from the room manager's clock so clients can compare
/// them with room deadlines.
struct Outbox<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    clock: &'a dyn Clock,
    seq: u64,
}

impl<C: Codec> Outbox<'_, C> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    async fn send(&mut self, payload: Payload) -> Result<(), GetawayError> {
        let envelope = Envelope {
            seq: self.seq,
            timestamp: self.now_ms(),
            payload,
        };
        self.seq += 1;
        let bytes = self.codec.encode(&envelope)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ProtocolError::InvalidMessage("codec produced non-UTF-8 output".into()))?;
        self.conn.send(&text).await?;
        Ok(())
    }

    async fn send_error(&mut self, code: u16, message: impl Into<String>) -> Result<(), GetawayError> {
        self.send(Payload::System(SystemMessage::Error {
            code,
            message: message.into(),
        }))
        .await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<B, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<B, C>>,
) -> Result<(), GetawayError>
where
    B: SettlementBridge,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let clock = state.rooms.clock();
    let mut outbox = Outbox {
        conn: &conn,
        codec: &state.codec,
        clock: &*clock,
        seq: 0,
    };
    let address = perform_handshake(&conn, &state.codec, &mut outbox).await?;
    tracing::info!(%conn_id, %address, "client connected");

    loop {
        let text = match tokio::time::timeout(IDLE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => {
                tracing::info!(%address, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%address, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%address, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(text.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%address, error = %e, "failed to decode envelope");
                outbox.send_error(400, format!("malformed message: {e}")).await?;
                continue;
            }
        };

        match envelope.payload {
            Payload::System(msg) => {
                if handle_system_message(&address, msg, &mut outbox).await? {
                    break;
                }
            }
            Payload::Request(request) => {
                handle_request(&state, &address, envelope.seq, request, &mut outbox).await?;
            }
            Payload::Reply { .. } | Payload::Failure { .. } => {
                tracing::debug!(%address, "ignoring reply sent by client");
            }
        }
    }

    Ok(())
}

/// Receives the `Handshake`, checks the version and answers with
/// `HandshakeAck`. Returns the caller address for the connection.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    outbox: &mut Outbox<'_, C>,
) -> Result<Address, GetawayError> {
    let text = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(text))) => text,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into()),
    };

    let envelope: Envelope = codec.decode(text.as_bytes())?;
    let (version, address) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, address }) => (version, address),
        _ => {
            outbox.send_error(400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage("first message must be Handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        outbox
            .send_error(
                400,
                format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            )
            .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }
    if address.as_str().trim().is_empty() {
        outbox.send_error(400, "address must not be empty").await?;
        return Err(ProtocolError::InvalidMessage("empty handshake address".into()).into());
    }

    outbox
        .send(Payload::System(SystemMessage::HandshakeAck {
            address: address.clone(),
            server_time: outbox.now_ms(),
        }))
        .await?;
    Ok(address)
}

/// Handles a system message. Returns `true` if the connection should close.
async fn handle_system_message<C: Codec>(
    address: &Address,
    msg: SystemMessage,
    outbox: &mut Outbox<'_, C>,
) -> Result<bool, GetawayError> {
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            outbox
                .send(Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: outbox.now_ms(),
                }))
                .await?;
        }
        SystemMessage::Disconnect { reason } => {
            tracing::info!(%address, %reason, "client disconnected");
            return Ok(true);
        }
        _ => {
            tracing::debug!(%address, "ignoring unexpected system message");
        }
    }
    Ok(false)
}

/// Dispatches one request and sends its `Reply` or `Failure`.
async fn handle_request<B, C>(
    state: &ServerState<B, C>,
    address: &Address,
    reply_to: u64,
    request: Request,
    outbox: &mut Outbox<'_, C>,
) -> Result<(), GetawayError>
where
    B: SettlementBridge,
    C: Codec,
{
    let op = request.op();
    tracing::debug!(%address, op, reply_to, "request");

    let payload = match dispatch(&state.rooms, address, request).await {
        Ok(body) => Payload::Reply { reply_to, body },
        Err(e) => {
            tracing::debug!(%address, op, kind = %e.kind(), error = %e, "request rejected");
            Payload::Failure {
                reply_to,
                kind: e.kind(),
                message: e.to_string(),
            }
        }
    };
    outbox.send(payload).await
}
