//! Derived views over the raw entity set: room summaries, member lists,
//! standings, per-game breakdowns, pending penalties, and match history.
//! Each view exists as a one-shot snapshot and as a [`LiveQuery`] that
//! re-emits on committed changes.

pub use live::LiveQuery;
pub use models::{
    GameBreakdown, MatchHistoryEntry, MemberProfile, PendingPenalty, PlayerStanding,
    RecordedResult, RoomSummary, UNKNOWN_PLAYER_LABEL,
};
pub use service::{StatsService, DEFAULT_HISTORY_LIMIT};

mod live;
mod models;
mod service;
