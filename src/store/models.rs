use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A registered account. Identity is stable; display fields are mutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    pub icon_url: Option<String>,
}

impl User {
    pub fn new(user_id: String, display_name: String, icon_url: Option<String>) -> Self {
        Self {
            user_id,
            display_name,
            icon_url,
        }
    }
}

/// A gaming-group room. Membership is implied by `Player` rows,
/// so the room itself only carries a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub name: String,
}

impl Room {
    /// Creates a new room with a generated ID
    pub fn new(name: String) -> Self {
        Self {
            room_id: new_id(),
            name,
        }
    }
}

/// Membership of one person (registered user or guest) in one room.
///
/// Exactly one of `user_id` / `guest_name` identifies the player. A player
/// with a `user_id` is a live member whose display fields are resolved
/// against the current `User` row at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub room_id: String,
    pub user_id: Option<String>,
    pub guest_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    /// Membership row for a registered user
    pub fn for_user(room_id: String, user_id: String) -> Self {
        Self {
            player_id: new_id(),
            room_id,
            user_id: Some(user_id),
            guest_name: None,
            joined_at: Utc::now(),
        }
    }

    /// Membership row for a guest with no account
    pub fn guest(room_id: String, guest_name: String) -> Self {
        Self {
            player_id: new_id(),
            room_id,
            user_id: None,
            guest_name: Some(guest_name),
            joined_at: Utc::now(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

/// A playable title scoped to one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub room_id: String,
    pub name: String,
}

impl Game {
    pub fn new(room_id: String, name: String) -> Self {
        Self {
            game_id: new_id(),
            room_id,
            name,
        }
    }
}

/// One recorded contest of a game within a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub room_id: String,
    pub game_id: String,
    pub match_date: DateTime<Utc>,
}

impl Match {
    pub fn new(room_id: String, game_id: String) -> Self {
        Self {
            match_id: new_id(),
            room_id,
            game_id,
            match_date: Utc::now(),
        }
    }
}

/// Win or loss of a single participant in a single match
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

/// Exactly one result row per participating player per match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub result_id: String,
    pub match_id: String,
    pub player_id: String,
    pub outcome: Outcome,
}

impl MatchResult {
    pub fn new(match_id: String, player_id: String, outcome: Outcome) -> Self {
        Self {
            result_id: new_id(),
            match_id,
            player_id,
            outcome,
        }
    }
}

/// A penalty assigned to one losing player of one match.
/// `is_completed` is the only mutable field and the transition is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub penalty_id: String,
    pub match_id: String,
    pub assignee_player_id: String,
    pub description: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Penalty {
    pub fn new(match_id: String, assignee_player_id: String, description: String) -> Self {
        Self {
            penalty_id: new_id(),
            match_id,
            assignee_player_id,
            description,
            is_completed: false,
            created_at: Utc::now(),
        }
    }
}

/// Reusable penalty text registered per room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyTemplate {
    pub template_id: String,
    pub room_id: String,
    pub description: String,
}

impl PenaltyTemplate {
    pub fn new(room_id: String, description: String) -> Self {
        Self {
            template_id: new_id(),
            room_id,
            description,
        }
    }
}
