use serde::{Deserialize, Serialize};

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

/// Request payload for adding a guest player to a room
#[derive(Debug, Deserialize)]
pub struct AddGuestRequest {
    pub guest_name: String,
}

/// Request payload for registering a game in a room
#[derive(Debug, Deserialize)]
pub struct AddGameRequest {
    pub name: String,
}

/// Request payload for recording a finished match.
/// A penalty is assigned to every loser iff `penalty_description` is
/// present and non-blank.
#[derive(Debug, Deserialize)]
pub struct RecordMatchRequest {
    pub game_id: String,
    pub winner_player_ids: Vec<String>,
    pub loser_player_ids: Vec<String>,
    pub penalty_description: Option<String>,
}

/// Request payload for updating the signed-in user's profile
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
    pub icon_url: Option<String>,
}

/// Request payload for saving a reusable penalty description
#[derive(Debug, Deserialize)]
pub struct AddTemplateRequest {
    pub description: String,
}

/// Response for a leave-room call. `room_deleted` is true when the caller
/// was the last player and the room was removed with all its data.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveRoomResponse {
    pub room_deleted: bool,
    pub remaining_players: usize,
}

/// Response for a recorded match
#[derive(Debug, Serialize, Deserialize)]
pub struct MatchRecordedResponse {
    pub match_id: String,
    pub result_count: usize,
    pub penalty_count: usize,
}

/// Query parameters for the match-history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Query parameters for the standings endpoint
#[derive(Debug, Deserialize)]
pub struct StandingsQuery {
    pub game_id: Option<String>,
}
