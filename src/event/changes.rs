use serde::{Deserialize, Serialize};

/// Notifications published by the store after a committed mutation
///
/// Changes are facts about rows that have already been written. Live
/// aggregation queries listen to them and recompute full replacement
/// snapshots; they never carry enough data to patch a view incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreChange {
    /// A room was created together with its first player
    RoomCreated { room_id: String },

    /// A room and all of its dependent rows were deleted
    RoomDeleted { room_id: String },

    /// A player row was added to a room
    PlayerAdded { room_id: String, player_id: String },

    /// A player row was removed from a room
    PlayerRemoved { room_id: String, player_id: String },

    /// A game was registered in a room
    GameAdded { room_id: String, game_id: String },

    /// A game and its matches were removed from a room
    GameRemoved { room_id: String, game_id: String },

    /// A match with its results and penalties was recorded
    MatchRecorded { room_id: String, match_id: String },

    /// A pending penalty was marked completed
    PenaltyCompleted { room_id: String, penalty_id: String },

    /// A penalty template was added to a room
    TemplateAdded { room_id: String, template_id: String },

    /// A penalty template was removed from a room
    TemplateRemoved { room_id: String, template_id: String },

    /// A user's profile fields changed; affects every room the user is in
    UserProfileChanged { user_id: String },
}

impl StoreChange {
    /// The room this change is scoped to, if any.
    /// Profile changes are global: they touch member views across rooms.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            StoreChange::RoomCreated { room_id }
            | StoreChange::RoomDeleted { room_id }
            | StoreChange::PlayerAdded { room_id, .. }
            | StoreChange::PlayerRemoved { room_id, .. }
            | StoreChange::GameAdded { room_id, .. }
            | StoreChange::GameRemoved { room_id, .. }
            | StoreChange::MatchRecorded { room_id, .. }
            | StoreChange::PenaltyCompleted { room_id, .. }
            | StoreChange::TemplateAdded { room_id, .. }
            | StoreChange::TemplateRemoved { room_id, .. } => Some(room_id),
            StoreChange::UserProfileChanged { .. } => None,
        }
    }

    /// Human-readable change kind for logging
    pub fn change_kind(&self) -> &'static str {
        match self {
            StoreChange::RoomCreated { .. } => "room_created",
            StoreChange::RoomDeleted { .. } => "room_deleted",
            StoreChange::PlayerAdded { .. } => "player_added",
            StoreChange::PlayerRemoved { .. } => "player_removed",
            StoreChange::GameAdded { .. } => "game_added",
            StoreChange::GameRemoved { .. } => "game_removed",
            StoreChange::MatchRecorded { .. } => "match_recorded",
            StoreChange::PenaltyCompleted { .. } => "penalty_completed",
            StoreChange::TemplateAdded { .. } => "template_added",
            StoreChange::TemplateRemoved { .. } => "template_removed",
            StoreChange::UserProfileChanged { .. } => "user_profile_changed",
        }
    }
}
