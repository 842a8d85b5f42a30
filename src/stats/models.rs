use serde::Serialize;

use crate::store::{Game, Match, MatchResult, Penalty, Player, Room, User};

/// Label shown when a participant can no longer be resolved to a player
/// row or a display name (pure guests without a name, departed members).
pub const UNKNOWN_PLAYER_LABEL: &str = "Unknown player";

/// A room on the signed-in user's room list, with its open-penalty badge
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room: Room,
    pub pending_penalty_count: usize,
}

/// One membership row joined to the member's current profile.
/// `user` is None for guests; guest display falls back to `guest_name`.
#[derive(Debug, Clone, Serialize)]
pub struct MemberProfile {
    pub player: Player,
    pub user: Option<User>,
}

impl MemberProfile {
    /// Display name resolved live: current user profile, then guest name,
    /// then a fixed placeholder. Never fails for guests or stale rows.
    pub fn display_name(&self) -> &str {
        if let Some(user) = &self.user {
            return &user.display_name;
        }
        self.player
            .guest_name
            .as_deref()
            .unwrap_or(UNKNOWN_PLAYER_LABEL)
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.icon_url.as_deref())
    }
}

/// An incomplete penalty with its assignee, as shown on the room screen.
/// The assignee is None when the player row was removed after assignment.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPenalty {
    pub penalty: Penalty,
    pub assignee: Option<MemberProfile>,
}

impl PendingPenalty {
    pub fn assignee_name(&self) -> &str {
        self.assignee
            .as_ref()
            .map(|m| m.display_name())
            .unwrap_or(UNKNOWN_PLAYER_LABEL)
    }
}

/// Win/loss tally for one current member of a room.
/// Players with no recorded results appear with zero counts.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStanding {
    pub member: MemberProfile,
    pub win_count: usize,
    pub loss_count: usize,
}

/// Per-game ranking block: how often the game was played and the
/// standings restricted to that game's matches.
#[derive(Debug, Clone, Serialize)]
pub struct GameBreakdown {
    pub game: Game,
    pub total_plays: usize,
    pub standings: Vec<PlayerStanding>,
}

/// One result row of a recorded match, resolved to the participant.
/// `participant` is None when the player has since left the room.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedResult {
    pub result: MatchResult,
    pub participant: Option<MemberProfile>,
}

impl RecordedResult {
    pub fn participant_name(&self) -> &str {
        self.participant
            .as_ref()
            .map(|m| m.display_name())
            .unwrap_or(UNKNOWN_PLAYER_LABEL)
    }
}

/// One entry of the recent-match list: the match, its game, and all
/// results expanded with member profiles.
#[derive(Debug, Clone, Serialize)]
pub struct MatchHistoryEntry {
    pub match_record: Match,
    pub game: Game,
    pub results: Vec<RecordedResult>,
}
