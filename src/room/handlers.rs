use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    service::LifecycleService,
    types::{
        AddGameRequest, AddGuestRequest, AddTemplateRequest, CreateRoomRequest, HistoryQuery,
        LeaveRoomResponse, MatchRecordedResponse, RecordMatchRequest, StandingsQuery,
        UpdateProfileRequest,
    },
};
use crate::shared::{AppError, AppState};
use crate::stats::{
    GameBreakdown, MatchHistoryEntry, MemberProfile, PendingPenalty, PlayerStanding, RoomSummary,
    StatsService, DEFAULT_HISTORY_LIMIT,
};
use crate::store::{Game, PenaltyTemplate, Player, Room, User};

fn lifecycle(state: &AppState) -> LifecycleService {
    LifecycleService::new(Arc::clone(&state.store), Arc::clone(&state.identity))
}

fn stats(state: &AppState) -> StatsService {
    StatsService::new(Arc::clone(&state.store))
}

/// POST /rooms
/// Creates a room with the signed-in user as its first player
#[instrument(name = "create_room", skip(state))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<Room>, AppError> {
    let room = lifecycle(&state).create_room(&request.name).await?;
    info!(room_id = %room.room_id, "Room created");
    Ok(Json(room))
}

/// GET /rooms
/// The signed-in user's rooms with pending-penalty badges
#[instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    let identity = state
        .identity
        .current_identity()
        .await
        .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;

    let summaries = stats(&state).room_summaries(&identity.user_id).await?;
    Ok(Json(summaries))
}

/// POST /rooms/:room_id/guests
#[instrument(name = "add_guest", skip(state))]
pub async fn add_guest(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<AddGuestRequest>,
) -> Result<Json<Player>, AppError> {
    let player = lifecycle(&state)
        .add_guest_player(&room_id, &request.guest_name)
        .await?;
    Ok(Json(player))
}

/// POST /rooms/:room_id/leave
#[instrument(name = "leave_room", skip(state))]
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<LeaveRoomResponse>, AppError> {
    let response = lifecycle(&state).leave_room(&room_id).await?;
    Ok(Json(response))
}

/// GET /rooms/:room_id/members
#[instrument(name = "list_members", skip(state))]
pub async fn list_members(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MemberProfile>>, AppError> {
    let members = stats(&state).members_with_profile(&room_id).await?;
    Ok(Json(members))
}

/// POST /rooms/:room_id/games
#[instrument(name = "add_game", skip(state))]
pub async fn add_game(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<AddGameRequest>,
) -> Result<Json<Game>, AppError> {
    let game = lifecycle(&state).add_game(&room_id, &request.name).await?;
    Ok(Json(game))
}

/// GET /rooms/:room_id/games
#[instrument(name = "list_games", skip(state))]
pub async fn list_games(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Game>>, AppError> {
    let games = lifecycle(&state).list_games(&room_id).await?;
    Ok(Json(games))
}

/// DELETE /games/:game_id
#[instrument(name = "remove_game", skip(state))]
pub async fn remove_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    lifecycle(&state).remove_game(&game_id).await?;
    Ok(Json(serde_json::json!({ "deleted": game_id })))
}

/// POST /rooms/:room_id/matches
#[instrument(name = "record_match", skip(state, request))]
pub async fn record_match(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<RecordMatchRequest>,
) -> Result<Json<MatchRecordedResponse>, AppError> {
    let response = lifecycle(&state).record_match(&room_id, request).await?;
    info!(room_id = %room_id, match_id = %response.match_id, "Match recorded");
    Ok(Json(response))
}

/// GET /rooms/:room_id/history?limit=N
#[instrument(name = "match_history", skip(state))]
pub async fn match_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MatchHistoryEntry>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = stats(&state).recent_match_history(&room_id, limit).await?;
    Ok(Json(history))
}

/// GET /rooms/:room_id/penalties
#[instrument(name = "list_penalties", skip(state))]
pub async fn list_penalties(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<PendingPenalty>>, AppError> {
    let penalties = stats(&state).pending_penalties(&room_id).await?;
    Ok(Json(penalties))
}

/// POST /penalties/:penalty_id/complete
#[instrument(name = "complete_penalty", skip(state))]
pub async fn complete_penalty(
    State(state): State<AppState>,
    Path(penalty_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    lifecycle(&state).complete_penalty(&penalty_id).await?;
    Ok(Json(serde_json::json!({ "completed": penalty_id })))
}

/// GET /rooms/:room_id/standings?game_id=...
#[instrument(name = "standings", skip(state))]
pub async fn standings(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<StandingsQuery>,
) -> Result<Json<Vec<PlayerStanding>>, AppError> {
    let standings = stats(&state)
        .player_standings(&room_id, query.game_id.as_deref())
        .await?;
    Ok(Json(standings))
}

/// GET /rooms/:room_id/breakdown
#[instrument(name = "game_breakdown", skip(state))]
pub async fn game_breakdown(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<GameBreakdown>>, AppError> {
    let breakdowns = stats(&state).game_breakdowns(&room_id).await?;
    Ok(Json(breakdowns))
}

/// GET /profile
#[instrument(name = "get_profile", skip(state))]
pub async fn get_profile(State(state): State<AppState>) -> Result<Json<User>, AppError> {
    let profile = lifecycle(&state).current_profile().await?;
    Ok(Json(profile))
}

/// PUT /profile
#[instrument(name = "update_profile", skip(state, request))]
pub async fn update_profile(
    State(state): State<AppState>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let user = lifecycle(&state).update_user_profile(request).await?;
    Ok(Json(user))
}

/// POST /rooms/:room_id/penalty-templates
#[instrument(name = "add_template", skip(state))]
pub async fn add_template(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(request): Json<AddTemplateRequest>,
) -> Result<Json<PenaltyTemplate>, AppError> {
    let template = lifecycle(&state)
        .add_penalty_template(&room_id, &request.description)
        .await?;
    Ok(Json(template))
}

/// GET /rooms/:room_id/penalty-templates
#[instrument(name = "list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<PenaltyTemplate>>, AppError> {
    let templates = lifecycle(&state).list_penalty_templates(&room_id).await?;
    Ok(Json(templates))
}

/// DELETE /penalty-templates/:template_id
#[instrument(name = "remove_template", skip(state))]
pub async fn remove_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    lifecycle(&state).remove_penalty_template(&template_id).await?;
    Ok(Json(serde_json::json!({ "deleted": template_id })))
}
