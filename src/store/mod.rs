// Persistent entity storage contract
//
// The store owns atomicity: every compound operation that must not be torn
// (room creation with its first player, leave-with-cascade, match
// recording) is a single trait method, and implementations run it as one
// transaction. After committing, implementations publish a `StoreChange`
// on their feed so live queries can recompute.

pub use memory::InMemoryStore;
pub use models::{Game, Match, MatchResult, Outcome, Penalty, PenaltyTemplate, Player, Room, User};

mod memory;
pub mod models;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::event::StoreChange;
use crate::shared::AppError;

/// Result of atomically removing a user's player row from a room
#[derive(Debug, Clone)]
pub enum LeaveRoomOutcome {
    /// Player removed; the room still has members
    Left { remaining_players: usize },
    /// Player removed and the room (with all dependent rows) deleted
    /// because membership reached zero
    RoomDeleted,
    /// The user has no player row in this room
    PlayerNotInRoom,
    /// Room does not exist
    RoomNotFound,
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    // --- users ---
    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    // --- rooms ---

    /// Atomically ensures a user row exists for the creator (without
    /// overwriting an existing profile), inserts the room, and inserts the
    /// creator's player row. All three apply or none do.
    async fn create_room_with_creator(&self, room: &Room, creator: &User) -> Result<(), AppError>;

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, AppError>;

    /// Rooms where the given user has an active player row
    async fn rooms_for_user(&self, user_id: &str) -> Result<Vec<Room>, AppError>;

    // --- players ---
    async fn insert_player(&self, player: &Player) -> Result<(), AppError>;
    async fn players_in_room(&self, room_id: &str) -> Result<Vec<Player>, AppError>;

    /// Atomically removes the user's player row and, when membership
    /// reaches zero within the same transaction, deletes the room and all
    /// of its dependent rows. The count check and the delete must not be
    /// separable.
    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<LeaveRoomOutcome, AppError>;

    // --- games ---
    async fn insert_game(&self, game: &Game) -> Result<(), AppError>;
    async fn games_in_room(&self, room_id: &str) -> Result<Vec<Game>, AppError>;

    /// Deletes a game together with its matches, results, and penalties
    async fn delete_game(&self, game_id: &str) -> Result<(), AppError>;

    // --- matches ---

    /// Atomically inserts a match with all of its result rows and any
    /// penalties created at record time.
    async fn record_match(
        &self,
        recorded: &Match,
        results: &[MatchResult],
        penalties: &[Penalty],
    ) -> Result<(), AppError>;

    async fn matches_in_room(&self, room_id: &str) -> Result<Vec<Match>, AppError>;
    async fn results_for_match(&self, match_id: &str) -> Result<Vec<MatchResult>, AppError>;

    // --- penalties ---

    /// All penalties whose match belongs to the room, completed or not
    async fn penalties_in_room(&self, room_id: &str) -> Result<Vec<Penalty>, AppError>;

    /// Marks a penalty completed. Idempotent: completing an already
    /// completed penalty is a no-op.
    async fn complete_penalty(&self, penalty_id: &str) -> Result<(), AppError>;

    // --- penalty templates ---
    async fn insert_penalty_template(&self, template: &PenaltyTemplate) -> Result<(), AppError>;
    async fn penalty_templates_in_room(
        &self,
        room_id: &str,
    ) -> Result<Vec<PenaltyTemplate>, AppError>;
    async fn delete_penalty_template(&self, template_id: &str) -> Result<(), AppError>;

    // --- change feed ---

    /// Subscribe to committed changes affecting one room
    async fn watch_room(&self, room_id: &str) -> broadcast::Receiver<StoreChange>;

    /// Subscribe to every committed change
    async fn watch_all(&self) -> broadcast::Receiver<StoreChange>;
}
