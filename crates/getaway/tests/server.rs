//! Integration tests for the server: real WebSocket clients against a
//! running server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use getaway::prelude::*;
use getaway_protocol::{CreatedRoom, RoundOutcome};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a free port. The escrow is returned so tests can
/// move its chain forward.
async fn start_server() -> (String, Arc<InMemoryEscrow>) {
    serve(GetawayServerBuilder::new()).await
}

async fn serve(builder: GetawayServerBuilder) -> (String, Arc<InMemoryEscrow>) {
    let escrow = Arc::new(InMemoryEscrow::new(3));
    let server = builder
        .bind("127.0.0.1:0")
        .seed(99)
        .build(Arc::clone(&escrow))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, escrow)
}

fn encode(envelope: &Envelope) -> Message {
    Message::text(serde_json::to_string(envelope).expect("encode"))
}

async fn next_envelope(ws: &mut ClientWs) -> Envelope {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("reply in time")
        .expect("stream open")
        .expect("frame");
    serde_json::from_str(msg.to_text().expect("text frame")).expect("decode")
}

/// A handshaken client that numbers its requests.
struct Client {
    ws: ClientWs,
    seq: u64,
}

impl Client {
    async fn raw(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("should connect");
        ws
    }

    async fn connect(addr: &str, address: &str) -> Self {
        let mut ws = Self::raw(addr).await;
        ws.send(encode(&Envelope {
            seq: 0,
            timestamp: 0,
            payload: Payload::System(SystemMessage::Handshake {
                version: PROTOCOL_VERSION,
                address: Address::new(address),
            }),
        }))
        .await
        .expect("send handshake");

        match next_envelope(&mut ws).await.payload {
            Payload::System(SystemMessage::HandshakeAck { address: acked, .. }) => {
                assert_eq!(acked.as_str(), address);
            }
            other => panic!("expected HandshakeAck, got {other:?}"),
        }
        Self { ws, seq: 1 }
    }

    /// Sends a request and returns the reply body or the failure.
    async fn call(&mut self, request: Request) -> Result<ReplyBody, (ErrorKind, String)> {
        let seq = self.seq;
        self.seq += 1;
        self.ws
            .send(encode(&Envelope {
                seq,
                timestamp: 0,
                payload: Payload::Request(request),
            }))
            .await
            .expect("send request");

        match next_envelope(&mut self.ws).await.payload {
            Payload::Reply { reply_to, body } => {
                assert_eq!(reply_to, seq);
                Ok(body)
            }
            Payload::Failure {
                reply_to,
                kind,
                message,
            } => {
                assert_eq!(reply_to, seq);
                Err((kind, message))
            }
            other => panic!("expected Reply or Failure, got {other:?}"),
        }
    }

    async fn ok(&mut self, request: Request) -> ReplyBody {
        self.call(request).await.expect("request should succeed")
    }
}

async fn create_room(client: &mut Client, role: Role) -> CreatedRoom {
    match client
        .ok(Request::CreateRoom {
            nickname: None,
            role,
        })
        .await
    {
        ReplyBody::RoomCreated(created) => created,
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

async fn join(client: &mut Client, code: &RoomCode, role: Role) {
    match client
        .ok(Request::JoinRoom {
            room_code: code.as_str().to_lowercase(),
            nickname: None,
            role,
        })
        .await
    {
        ReplyBody::Joined { .. } => {}
        other => panic!("expected Joined, got {other:?}"),
    }
}

async fn resolve(client: &mut Client, room_id: RoomId, round: u32) -> RoundOutcome {
    match client
        .ok(Request::ResolveRound {
            room_id,
            expected_round: Some(round),
        })
        .await
    {
        ReplyBody::RoundResolved(outcome) => outcome,
        other => panic!("expected RoundResolved, got {other:?}"),
    }
}

/// Four clients in one room: the creator and `t2` are thieves, `p1` and
/// `p2` police.
async fn lobby(addr: &str) -> (RoomId, [Client; 4]) {
    let mut creator = Client::connect(addr, "0xt1").await;
    let mut t2 = Client::connect(addr, "0xt2").await;
    let mut p1 = Client::connect(addr, "0xp1").await;
    let mut p2 = Client::connect(addr, "0xp2").await;

    let created = create_room(&mut creator, Role::Thief).await;
    join(&mut t2, &created.room_code, Role::Thief).await;
    join(&mut p1, &created.room_code, Role::Police).await;
    join(&mut p2, &created.room_code, Role::Police).await;
    (created.room_id, [creator, t2, p1, p2])
}

// =========================================================================
// Handshake and system messages
// =========================================================================

#[tokio::test]
async fn test_handshake_version_mismatch_gets_error_400() {
    let (addr, _) = start_server().await;
    let mut ws = Client::raw(&addr).await;
    ws.send(encode(&Envelope {
        seq: 0,
        timestamp: 0,
        payload: Payload::System(SystemMessage::Handshake {
            version: 999,
            address: Address::new("0xa"),
        }),
    }))
    .await
    .unwrap();

    match next_envelope(&mut ws).await.payload {
        Payload::System(SystemMessage::Error { code, message }) => {
            assert_eq!(code, 400);
            assert!(message.contains("version mismatch"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_before_handshake_is_rejected() {
    let (addr, _) = start_server().await;
    let mut ws = Client::raw(&addr).await;
    ws.send(encode(&Envelope {
        seq: 0,
        timestamp: 0,
        payload: Payload::Request(Request::ListActiveRooms),
    }))
    .await
    .unwrap();

    match next_envelope(&mut ws).await.payload {
        Payload::System(SystemMessage::Error { code, .. }) => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_time_follows_room_clock() {
    let clock = ManualClock::new(1_000_000);
    let (addr, _) = serve(GetawayServerBuilder::new().clock(clock.clone())).await;

    let mut ws = Client::raw(&addr).await;
    ws.send(encode(&Envelope {
        seq: 0,
        timestamp: 0,
        payload: Payload::System(SystemMessage::Handshake {
            version: PROTOCOL_VERSION,
            address: Address::new("0xa"),
        }),
    }))
    .await
    .unwrap();
    let ack = next_envelope(&mut ws).await;
    assert_eq!(ack.timestamp, 1_000_000);
    match ack.payload {
        Payload::System(SystemMessage::HandshakeAck { server_time, .. }) => {
            assert_eq!(server_time, 1_000_000);
        }
        other => panic!("expected HandshakeAck, got {other:?}"),
    }

    clock.advance(2_500);
    ws.send(encode(&Envelope {
        seq: 1,
        timestamp: 0,
        payload: Payload::System(SystemMessage::Heartbeat { client_time: 7 }),
    }))
    .await
    .unwrap();
    match next_envelope(&mut ws).await.payload {
        Payload::System(SystemMessage::HeartbeatAck { server_time, .. }) => {
            assert_eq!(server_time, 1_002_500);
        }
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let (addr, _) = start_server().await;
    let mut client = Client::connect(&addr, "0xa").await;
    client
        .ws
        .send(encode(&Envelope {
            seq: 1,
            timestamp: 0,
            payload: Payload::System(SystemMessage::Heartbeat { client_time: 1234 }),
        }))
        .await
        .unwrap();

    match next_envelope(&mut client.ws).await.payload {
        Payload::System(SystemMessage::HeartbeatAck {
            client_time,
            server_time,
        }) => {
            assert_eq!(client_time, 1234);
            assert!(server_time > 0);
        }
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let (addr, _) = start_server().await;
    let mut client = Client::connect(&addr, "0xa").await;
    client
        .ws
        .send(Message::text(r#"{"seq":1,"payload":"nope"}"#.to_string()))
        .await
        .unwrap();

    match next_envelope(&mut client.ws).await.payload {
        Payload::System(SystemMessage::Error { code, .. }) => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }

    match client.ok(Request::ListActiveRooms).await {
        ReplyBody::ActiveRooms { rooms } => assert!(rooms.is_empty()),
        other => panic!("expected ActiveRooms, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let (addr, _) = start_server().await;
    let mut client = Client::connect(&addr, "0xa").await;
    client
        .ws
        .send(encode(&Envelope {
            seq: 1,
            timestamp: 0,
            payload: Payload::System(SystemMessage::Disconnect {
                reason: "bye".into(),
            }),
        }))
        .await
        .unwrap();

    let next = tokio::time::timeout(Duration::from_secs(5), client.ws.next())
        .await
        .expect("server should close");
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_lookups_of_absent_things_are_definitive() {
    let (addr, _) = start_server().await;
    let mut client = Client::connect(&addr, "0xa").await;

    assert_eq!(
        client.ok(Request::GetRoom { room_id: RoomId(77) }).await,
        ReplyBody::Room { room: None }
    );
    assert_eq!(
        client
            .ok(Request::GetRoomByCode {
                room_code: "ZZZZZZ".into()
            })
            .await,
        ReplyBody::Room { room: None }
    );
    assert_eq!(
        client
            .ok(Request::GetRoomPlayers { room_id: RoomId(77) })
            .await,
        ReplyBody::Players { players: vec![] }
    );

    let (kind, _) = client
        .call(Request::GetRoomByCode {
            room_code: "TOO-LONG-CODE".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(kind, ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_full_game_over_websocket() {
    let (addr, _) = start_server().await;
    let (room_id, [mut creator, mut t2, mut p1, mut p2]) = lobby(&addr).await;

    // Only the creator may start.
    let (kind, message) = p1
        .call(Request::StartGame {
            room_id,
            entry_fee: 1.0,
            game_id: 42,
        })
        .await
        .unwrap_err();
    assert_eq!(kind, ErrorKind::Forbidden);
    assert_eq!(message, "only the room creator can start the game");

    assert_eq!(
        creator
            .ok(Request::StartGame {
                room_id,
                entry_fee: 1.0,
                game_id: 42,
            })
            .await,
        ReplyBody::Done
    );

    for round in 1..=4 {
        for client in [&mut creator, &mut t2, &mut p1, &mut p2] {
            // Caught thieves are refused a vote in later rounds.
            let _ = client
                .call(Request::SubmitVote {
                    room_id,
                    choice: "Rooftops".into(),
                })
                .await;
        }
        let outcome = resolve(&mut p1, room_id, round).await;
        assert_eq!(outcome.round, round);

        let (kind, _) = p2
            .call(Request::ResolveRound {
                room_id,
                expected_round: Some(round),
            })
            .await
            .unwrap_err();
        assert!(matches!(kind, ErrorKind::StaleRound | ErrorKind::GameNotActive));
    }

    let room = match creator.ok(Request::GetRoom { room_id }).await {
        ReplyBody::Room { room: Some(room) } => room,
        other => panic!("expected Room, got {other:?}"),
    };
    assert_eq!(room.game_phase, GamePhase::Finished);
    let winners = room.winners.expect("winners once finished");
    assert!(!winners.is_empty());

    assert_eq!(
        creator
            .ok(Request::FinalizeGame {
                room_id,
                winners,
                vault: 4.0,
            })
            .await,
        ReplyBody::Done
    );
    match creator.ok(Request::ListActiveRooms).await {
        ReplyBody::ActiveRooms { rooms } => assert!(rooms.is_empty()),
        other => panic!("expected ActiveRooms, got {other:?}"),
    }
}

#[tokio::test]
async fn test_vote_failure_kinds() {
    let (addr, _) = start_server().await;
    let (room_id, [mut creator, _t2, _p1, _p2]) = lobby(&addr).await;
    let mut outsider = Client::connect(&addr, "0xoutsider").await;

    let (kind, _) = creator
        .call(Request::SubmitVote {
            room_id,
            choice: "Rooftops".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(kind, ErrorKind::WrongPhase);

    creator
        .ok(Request::StartGame {
            room_id,
            entry_fee: 0.0,
            game_id: 7,
        })
        .await;
    let (kind, _) = outsider
        .call(Request::SubmitVote {
            room_id,
            choice: "Rooftops".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(kind, ErrorKind::NotAMember);

    creator
        .ok(Request::SubmitVote {
            room_id,
            choice: "Sewer Tunnel".into(),
        })
        .await;
    match creator.ok(Request::GetPlayerVote { room_id, round: 1 }).await {
        ReplyBody::PlayerVote { vote: Some(vote) } => assert_eq!(vote.choice, "Sewer Tunnel"),
        other => panic!("expected PlayerVote, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refund_after_cooldown() {
    let (addr, escrow) = start_server().await;
    let (room_id, [mut creator, ..]) = lobby(&addr).await;
    creator
        .ok(Request::StartGame {
            room_id,
            entry_fee: 0.5,
            game_id: 8,
        })
        .await;

    match creator.ok(Request::RefundEligibility { room_id }).await {
        ReplyBody::RefundEligibility(e) => {
            assert!(!e.eligible);
            assert_eq!(e.reason.as_deref(), Some("cooldown not reached"));
        }
        other => panic!("expected RefundEligibility, got {other:?}"),
    }

    escrow.advance_blocks(3).await;
    assert_eq!(creator.ok(Request::RefundGame { room_id }).await, ReplyBody::Done);

    let (kind, _) = creator.call(Request::RefundGame { room_id }).await.unwrap_err();
    assert_eq!(kind, ErrorKind::AlreadyFinalized);
}

#[tokio::test]
async fn test_config_round_trip() {
    let (addr, _) = start_server().await;
    let mut client = Client::connect(&addr, "0xadmin").await;

    match client.ok(Request::GetConfig).await {
        ReplyBody::Config(config) => assert_eq!(config, GameConfig::default()),
        other => panic!("expected Config, got {other:?}"),
    }

    let update = GameConfigUpdate {
        max_total_players: Some(10),
        ..GameConfigUpdate::default()
    };
    match client.ok(Request::UpdateConfig { update }).await {
        ReplyBody::Config(config) => {
            assert_eq!(config.max_total_players, 10);
            assert_eq!(config.team_cap(), 5);
        }
        other => panic!("expected Config, got {other:?}"),
    }
}
