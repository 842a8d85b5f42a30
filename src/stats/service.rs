use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::models::{
    GameBreakdown, MatchHistoryEntry, MemberProfile, PendingPenalty, PlayerStanding,
    RecordedResult, RoomSummary,
};
use crate::shared::AppError;
use crate::store::{ChallengeStore, Match, Outcome, Player};

/// Number of matches shown on the room screen's history panel
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Read-only derived views over the entity set.
///
/// Every method computes a full snapshot from raw store rows; the
/// aggregation (joins, grouping, tallies) happens here rather than in the
/// store. Snapshots are recomputed per call, which keeps them consistent
/// with whatever the store committed last.
#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn ChallengeStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn ChallengeStore>) -> Self {
        Self { store }
    }

    pub(super) fn store(&self) -> &Arc<dyn ChallengeStore> {
        &self.store
    }

    /// Rooms where the user has an active player row, each with its count
    /// of incomplete penalties. Ordered by room name, then id.
    #[instrument(skip(self))]
    pub async fn room_summaries(&self, user_id: &str) -> Result<Vec<RoomSummary>, AppError> {
        let rooms = self.store.rooms_for_user(user_id).await?;

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let pending_penalty_count = self
                .store
                .penalties_in_room(&room.room_id)
                .await?
                .iter()
                .filter(|p| !p.is_completed)
                .count();
            summaries.push(RoomSummary {
                room,
                pending_penalty_count,
            });
        }

        summaries.sort_by(|a, b| {
            (a.room.name.as_str(), a.room.room_id.as_str())
                .cmp(&(b.room.name.as_str(), b.room.room_id.as_str()))
        });

        debug!(user_id = %user_id, rooms = summaries.len(), "Room summaries computed");
        Ok(summaries)
    }

    /// Every player of the room joined to the current user record
    /// (left-outer: guests have no user). Ordered by join time.
    #[instrument(skip(self))]
    pub async fn members_with_profile(
        &self,
        room_id: &str,
    ) -> Result<Vec<MemberProfile>, AppError> {
        self.require_room(room_id).await?;

        let mut players = self.store.players_in_room(room_id).await?;
        players.sort_by(|a, b| {
            (a.joined_at, a.player_id.as_str()).cmp(&(b.joined_at, b.player_id.as_str()))
        });

        let mut members = Vec::with_capacity(players.len());
        for player in players {
            members.push(self.resolve_member(player).await?);
        }
        Ok(members)
    }

    /// Incomplete penalties of the room, joined through their match and
    /// resolved to the assignee's membership-with-profile.
    #[instrument(skip(self))]
    pub async fn pending_penalties(&self, room_id: &str) -> Result<Vec<PendingPenalty>, AppError> {
        self.require_room(room_id).await?;

        let mut penalties: Vec<_> = self
            .store
            .penalties_in_room(room_id)
            .await?
            .into_iter()
            .filter(|p| !p.is_completed)
            .collect();
        penalties.sort_by(|a, b| {
            (a.created_at, a.penalty_id.as_str()).cmp(&(b.created_at, b.penalty_id.as_str()))
        });

        let players = self.player_index(room_id).await?;

        let mut pending = Vec::with_capacity(penalties.len());
        for penalty in penalties {
            let assignee = match players.get(&penalty.assignee_player_id) {
                Some(player) => Some(self.resolve_member(player.clone()).await?),
                None => None,
            };
            pending.push(PendingPenalty { penalty, assignee });
        }
        Ok(pending)
    }

    /// Win/loss tally per current player of the room, optionally
    /// restricted to one game's matches. Covers all players, including
    /// those without a single recorded result. Sorted by win count
    /// descending; ties break on join time.
    #[instrument(skip(self))]
    pub async fn player_standings(
        &self,
        room_id: &str,
        game_id: Option<&str>,
    ) -> Result<Vec<PlayerStanding>, AppError> {
        self.require_room(room_id).await?;

        let mut players = self.store.players_in_room(room_id).await?;
        players.sort_by(|a, b| {
            (a.joined_at, a.player_id.as_str()).cmp(&(b.joined_at, b.player_id.as_str()))
        });

        let tallies = self.tally_results(room_id, game_id).await?;

        let mut standings = Vec::with_capacity(players.len());
        for player in players {
            let (win_count, loss_count) = tallies
                .get(&player.player_id)
                .copied()
                .unwrap_or((0, 0));
            standings.push(PlayerStanding {
                member: self.resolve_member(player).await?,
                win_count,
                loss_count,
            });
        }

        // players is already join-ordered; a stable sort on wins keeps
        // that order as the tie-break
        standings.sort_by(|a, b| b.win_count.cmp(&a.win_count));
        Ok(standings)
    }

    /// Per-game ranking blocks for every game with at least one recorded
    /// match, ordered by how often the game was played.
    #[instrument(skip(self))]
    pub async fn game_breakdowns(&self, room_id: &str) -> Result<Vec<GameBreakdown>, AppError> {
        self.require_room(room_id).await?;

        let games = self.store.games_in_room(room_id).await?;
        let matches = self.store.matches_in_room(room_id).await?;

        let mut plays_per_game: HashMap<&str, usize> = HashMap::new();
        for m in &matches {
            *plays_per_game.entry(m.game_id.as_str()).or_default() += 1;
        }

        let mut breakdowns = Vec::new();
        for game in games {
            let total_plays = plays_per_game
                .get(game.game_id.as_str())
                .copied()
                .unwrap_or(0);
            if total_plays == 0 {
                continue;
            }
            let standings = self.player_standings(room_id, Some(&game.game_id)).await?;
            breakdowns.push(GameBreakdown {
                game,
                total_plays,
                standings,
            });
        }

        breakdowns.sort_by(|a, b| {
            b.total_plays
                .cmp(&a.total_plays)
                .then_with(|| a.game.name.cmp(&b.game.name))
                .then_with(|| a.game.game_id.cmp(&b.game.game_id))
        });
        Ok(breakdowns)
    }

    /// The most recent `limit` matches of the room by date descending,
    /// each expanded with its game and all results resolved to profiles.
    #[instrument(skip(self))]
    pub async fn recent_match_history(
        &self,
        room_id: &str,
        limit: usize,
    ) -> Result<Vec<MatchHistoryEntry>, AppError> {
        if limit == 0 {
            return Err(AppError::InvalidArgument(
                "History limit must be positive".to_string(),
            ));
        }
        self.require_room(room_id).await?;

        let mut matches = self.store.matches_in_room(room_id).await?;
        matches.sort_by(|a, b| {
            (b.match_date, b.match_id.as_str()).cmp(&(a.match_date, a.match_id.as_str()))
        });
        matches.truncate(limit);

        let games: HashMap<String, _> = self
            .store
            .games_in_room(room_id)
            .await?
            .into_iter()
            .map(|g| (g.game_id.clone(), g))
            .collect();
        let players = self.player_index(room_id).await?;

        let mut history = Vec::with_capacity(matches.len());
        for match_record in matches {
            // Game deletion cascades its matches, so the join always
            // resolves for rows the store can still return.
            let Some(game) = games.get(&match_record.game_id).cloned() else {
                debug!(match_id = %match_record.match_id, "Skipping match with missing game");
                continue;
            };
            let results = self.resolve_results(&match_record, &players).await?;
            history.push(MatchHistoryEntry {
                match_record,
                game,
                results,
            });
        }
        Ok(history)
    }

    async fn resolve_results(
        &self,
        match_record: &Match,
        players: &HashMap<String, Player>,
    ) -> Result<Vec<RecordedResult>, AppError> {
        let mut results = self.store.results_for_match(&match_record.match_id).await?;
        results.sort_by(|a, b| {
            // winners first, then deterministic within each side
            let rank = |r: &crate::store::MatchResult| match r.outcome {
                Outcome::Win => 0,
                Outcome::Loss => 1,
            };
            (rank(a), a.result_id.as_str()).cmp(&(rank(b), b.result_id.as_str()))
        });

        let mut resolved = Vec::with_capacity(results.len());
        for result in results {
            let participant = match players.get(&result.player_id) {
                Some(player) => Some(self.resolve_member(player.clone()).await?),
                None => None,
            };
            resolved.push(RecordedResult {
                result,
                participant,
            });
        }
        Ok(resolved)
    }

    /// Counts wins and losses per player over the room's results,
    /// restricted to one game when given. Results of departed players are
    /// tallied too but dropped later when no player row matches.
    async fn tally_results(
        &self,
        room_id: &str,
        game_id: Option<&str>,
    ) -> Result<HashMap<String, (usize, usize)>, AppError> {
        let matches = self.store.matches_in_room(room_id).await?;

        let mut tallies: HashMap<String, (usize, usize)> = HashMap::new();
        for m in &matches {
            if let Some(game_id) = game_id {
                if m.game_id != game_id {
                    continue;
                }
            }
            for result in self.store.results_for_match(&m.match_id).await? {
                let entry = tallies.entry(result.player_id).or_default();
                match result.outcome {
                    Outcome::Win => entry.0 += 1,
                    Outcome::Loss => entry.1 += 1,
                }
            }
        }
        Ok(tallies)
    }

    async fn resolve_member(&self, player: Player) -> Result<MemberProfile, AppError> {
        let user = match &player.user_id {
            Some(user_id) => self.store.get_user(user_id).await?,
            None => None,
        };
        Ok(MemberProfile { player, user })
    }

    async fn player_index(&self, room_id: &str) -> Result<HashMap<String, Player>, AppError> {
        Ok(self
            .store
            .players_in_room(room_id)
            .await?
            .into_iter()
            .map(|p| (p.player_id.clone(), p))
            .collect())
    }

    async fn require_room(&self, room_id: &str) -> Result<(), AppError> {
        self.store
            .get_room(room_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))
    }
}
