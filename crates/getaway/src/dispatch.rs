//! Maps one [`Request`] onto the room manager.

use getaway_protocol::{Address, ReplyBody, Request, RoomCode};
use getaway_room::{GameError, RoomManager};
use getaway_settlement::SettlementBridge;

fn parse_code(input: &str) -> Result<RoomCode, GameError> {
    RoomCode::parse(input).map_err(|e| GameError::InvalidInput(e.to_string()))
}

/// Runs `request` on behalf of `caller`, the address bound at handshake.
pub(crate) async fn dispatch<B: SettlementBridge>(
    rooms: &RoomManager<B>,
    caller: &Address,
    request: Request,
) -> Result<ReplyBody, GameError> {
    let body = match request {
        Request::CreateRoom { nickname, role } => {
            ReplyBody::RoomCreated(rooms.create_room(caller.clone(), nickname, role)?)
        }
        Request::JoinRoom {
            room_code,
            nickname,
            role,
        } => {
            let code = parse_code(&room_code)?;
            let room_id = rooms.join_room(&code, caller.clone(), nickname, role).await?;
            ReplyBody::Joined { room_id }
        }
        Request::GetRoomByCode { room_code } => ReplyBody::Room {
            room: rooms.get_room_by_code(&parse_code(&room_code)?).await?,
        },
        Request::GetRoom { room_id } => ReplyBody::Room {
            room: rooms.get_room(room_id).await?,
        },
        Request::GetRoomPlayers { room_id } => ReplyBody::Players {
            players: rooms.get_room_players(room_id).await?,
        },
        Request::StartGame {
            room_id,
            entry_fee,
            game_id,
        } => {
            rooms
                .start_game(room_id, caller.clone(), entry_fee, game_id)
                .await?;
            ReplyBody::Done
        }
        Request::SubmitVote { room_id, choice } => {
            rooms.submit_vote(room_id, caller.clone(), choice).await?;
            ReplyBody::Done
        }
        Request::GetRoundVotes { room_id, round } => ReplyBody::Votes {
            votes: rooms.get_round_votes(room_id, round).await?,
        },
        Request::GetPlayerVote { room_id, round } => ReplyBody::PlayerVote {
            vote: rooms.get_player_vote(room_id, round, caller.clone()).await?,
        },
        Request::GetPoliceSummary { room_id, round } => {
            ReplyBody::PoliceSummary(rooms.get_police_summary(room_id, round).await?)
        }
        Request::ResolveRound {
            room_id,
            expected_round,
        } => ReplyBody::RoundResolved(rooms.resolve_round(room_id, expected_round).await?),
        Request::FinalizeGame {
            room_id,
            winners,
            vault,
        } => {
            rooms
                .finalize_game(room_id, caller.clone(), winners, vault)
                .await?;
            ReplyBody::Done
        }
        Request::RefundGame { room_id } => {
            rooms.refund_game(room_id, caller.clone()).await?;
            ReplyBody::Done
        }
        Request::RefundEligibility { room_id } => {
            ReplyBody::RefundEligibility(rooms.refund_eligibility(room_id, caller.clone()).await?)
        }
        Request::DeleteRoom { room_id } => {
            rooms.delete_room(room_id, caller.clone()).await?;
            ReplyBody::Done
        }
        Request::ListActiveRooms => ReplyBody::ActiveRooms {
            rooms: rooms.list_active_rooms().await,
        },
        Request::GetConfig => ReplyBody::Config(rooms.config().get_or_default().as_ref().clone()),
        Request::UpdateConfig { update } => {
            let config = rooms.config().update(update);
            tracing::info!(caller = %caller, "game config updated");
            ReplyBody::Config(config.as_ref().clone())
        }
    };
    Ok(body)
}
