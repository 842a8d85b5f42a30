use std::future::Future;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, instrument, warn};

use super::models::{
    GameBreakdown, MatchHistoryEntry, MemberProfile, PendingPenalty, PlayerStanding, RoomSummary,
};
use super::service::StatsService;
use crate::event::StoreChange;
use crate::shared::AppError;

const LIVE_QUERY_BUFFER: usize = 16;

/// A continuously updated aggregate view.
///
/// Yields a full replacement snapshot whenever a relevant change commits,
/// starting with the current state. Errors from a recompute are emitted
/// in-band rather than swallowed, so a consumer can tell "empty" apart
/// from "failed". Dropping the query cancels its background task.
pub struct LiveQuery<T> {
    receiver: mpsc::Receiver<Result<T, AppError>>,
}

impl<T> LiveQuery<T> {
    /// The next snapshot, or None once the query has ended (room deleted
    /// and final state emitted, or feed shut down).
    pub async fn next(&mut self) -> Option<Result<T, AppError>> {
        self.receiver.recv().await
    }
}

impl StatsService {
    /// Live room list for a user. Re-emits on any committed change, since
    /// membership and penalty badges can shift from changes in any room.
    #[instrument(skip(self))]
    pub async fn watch_room_summaries(&self, user_id: &str) -> LiveQuery<Vec<RoomSummary>> {
        let service = self.clone();
        let user_id = user_id.to_string();
        self.spawn_global(move || {
            let service = service.clone();
            let user_id = user_id.clone();
            async move { service.room_summaries(&user_id).await }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn watch_members(&self, room_id: &str) -> LiveQuery<Vec<MemberProfile>> {
        let service = self.clone();
        let id = room_id.to_string();
        self.spawn_room_scoped(room_id, move || {
            let service = service.clone();
            let id = id.clone();
            async move { service.members_with_profile(&id).await }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn watch_pending_penalties(&self, room_id: &str) -> LiveQuery<Vec<PendingPenalty>> {
        let service = self.clone();
        let id = room_id.to_string();
        self.spawn_room_scoped(room_id, move || {
            let service = service.clone();
            let id = id.clone();
            async move { service.pending_penalties(&id).await }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn watch_player_standings(
        &self,
        room_id: &str,
        game_id: Option<String>,
    ) -> LiveQuery<Vec<PlayerStanding>> {
        let service = self.clone();
        let id = room_id.to_string();
        self.spawn_room_scoped(room_id, move || {
            let service = service.clone();
            let id = id.clone();
            let game_id = game_id.clone();
            async move { service.player_standings(&id, game_id.as_deref()).await }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn watch_game_breakdowns(&self, room_id: &str) -> LiveQuery<Vec<GameBreakdown>> {
        let service = self.clone();
        let id = room_id.to_string();
        self.spawn_room_scoped(room_id, move || {
            let service = service.clone();
            let id = id.clone();
            async move { service.game_breakdowns(&id).await }
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn watch_match_history(
        &self,
        room_id: &str,
        limit: usize,
    ) -> LiveQuery<Vec<MatchHistoryEntry>> {
        let service = self.clone();
        let id = room_id.to_string();
        self.spawn_room_scoped(room_id, move || {
            let service = service.clone();
            let id = id.clone();
            async move { service.recent_match_history(&id, limit).await }
        })
        .await
    }

    /// Recomputes on changes scoped to one room, plus profile edits from
    /// the global feed (profile changes carry no room id but alter how
    /// members render). Ends after the room channel closes, emitting one
    /// last snapshot so consumers observe the deletion.
    async fn spawn_room_scoped<T, F, Fut>(&self, room_id: &str, compute: F) -> LiveQuery<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let mut room_events = self.store().watch_room(room_id).await;
        let mut global_events = self.store().watch_all().await;
        let (sender, receiver) = mpsc::channel(LIVE_QUERY_BUFFER);
        let room_id = room_id.to_string();

        tokio::spawn(async move {
            if sender.send(compute().await).await.is_err() {
                return;
            }
            loop {
                let relevant = tokio::select! {
                    change = room_events.recv() => match change {
                        Ok(change) => {
                            debug!(room_id = %room_id, kind = change.change_kind(), "Room change for live query");
                            true
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(room_id = %room_id, missed, "Live query lagged, recomputing");
                            true
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // room deleted; show the terminal state and stop
                            let _ = sender.send(compute().await).await;
                            break;
                        }
                    },
                    change = global_events.recv() => match change {
                        Ok(StoreChange::UserProfileChanged { .. }) => true,
                        Ok(_) => false,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(room_id = %room_id, missed, "Live query lagged, recomputing");
                            true
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if relevant && sender.send(compute().await).await.is_err() {
                    break;
                }
            }
            debug!(room_id = %room_id, "Live query ended");
        });

        LiveQuery { receiver }
    }

    /// Recomputes on every committed change, for views not scoped to a
    /// single room.
    async fn spawn_global<T, F, Fut>(&self, compute: F) -> LiveQuery<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let mut global_events = self.store().watch_all().await;
        let (sender, receiver) = mpsc::channel(LIVE_QUERY_BUFFER);

        tokio::spawn(async move {
            if sender.send(compute().await).await.is_err() {
                return;
            }
            loop {
                match global_events.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if sender.send(compute().await).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Live query ended");
        });

        LiveQuery { receiver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        ChallengeStore, Game, InMemoryStore, Match, MatchResult, Outcome, Penalty, Player, Room,
        User,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    async fn next_ok<T>(query: &mut LiveQuery<T>) -> T {
        timeout(WAIT, query.next())
            .await
            .expect("live query timed out")
            .expect("live query ended")
            .expect("live query emitted error")
    }

    async fn setup() -> (Arc<InMemoryStore>, StatsService, Room) {
        let store = Arc::new(InMemoryStore::new());
        let stats = StatsService::new(store.clone());
        let room = Room::new("Game Night".to_string());
        let creator = User::new("user-1".to_string(), "Alice".to_string(), None);
        store
            .create_room_with_creator(&room, &creator)
            .await
            .unwrap();
        (store, stats, room)
    }

    #[tokio::test]
    async fn live_penalties_emit_initial_then_updated_snapshots() {
        let (store, stats, room) = setup().await;
        let guest = Player::guest(room.room_id.clone(), "Bob".to_string());
        store.insert_player(&guest).await.unwrap();
        let game = Game::new(room.room_id.clone(), "Catan".to_string());
        store.insert_game(&game).await.unwrap();

        let mut query = stats.watch_pending_penalties(&room.room_id).await;
        assert!(next_ok(&mut query).await.is_empty());

        let recorded = Match::new(room.room_id.clone(), game.game_id.clone());
        let results = vec![MatchResult::new(
            recorded.match_id.clone(),
            guest.player_id.clone(),
            Outcome::Loss,
        )];
        let penalties = vec![Penalty::new(
            recorded.match_id.clone(),
            guest.player_id.clone(),
            "wash dishes".to_string(),
        )];
        store
            .record_match(&recorded, &results, &penalties)
            .await
            .unwrap();

        let snapshot = next_ok(&mut query).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].assignee_name(), "Bob");

        store
            .complete_penalty(&snapshot[0].penalty.penalty_id)
            .await
            .unwrap();
        assert!(next_ok(&mut query).await.is_empty());
    }

    #[tokio::test]
    async fn live_members_react_to_profile_updates() {
        let (store, stats, room) = setup().await;

        let mut query = stats.watch_members(&room.room_id).await;
        let initial = next_ok(&mut query).await;
        assert_eq!(initial[0].display_name(), "Alice");

        store
            .upsert_user(&User::new(
                "user-1".to_string(),
                "Alicia".to_string(),
                None,
            ))
            .await
            .unwrap();

        let updated = next_ok(&mut query).await;
        assert_eq!(updated[0].display_name(), "Alicia");
    }

    #[tokio::test]
    async fn live_standings_react_to_recorded_matches() {
        let (store, stats, room) = setup().await;
        let guest = Player::guest(room.room_id.clone(), "Bob".to_string());
        store.insert_player(&guest).await.unwrap();
        let game = Game::new(room.room_id.clone(), "Catan".to_string());
        store.insert_game(&game).await.unwrap();

        let mut query = stats.watch_player_standings(&room.room_id, None).await;
        // initial snapshot then the membership/game inserts were before
        // subscription, so the first emission already shows both players
        let initial = next_ok(&mut query).await;
        assert_eq!(initial.len(), 2);
        assert!(initial.iter().all(|s| s.win_count == 0));

        let recorded = Match::new(room.room_id.clone(), game.game_id.clone());
        let results = vec![
            MatchResult::new(
                recorded.match_id.clone(),
                guest.player_id.clone(),
                Outcome::Win,
            ),
            MatchResult::new(
                recorded.match_id.clone(),
                initial[0].member.player.player_id.clone(),
                Outcome::Loss,
            ),
        ];
        store.record_match(&recorded, &results, &[]).await.unwrap();

        let updated = next_ok(&mut query).await;
        assert_eq!(updated[0].member.display_name(), "Bob");
        assert_eq!(updated[0].win_count, 1);
    }

    #[tokio::test]
    async fn live_query_surfaces_error_after_room_deletion() {
        let (store, stats, room) = setup().await;

        let mut query = stats.watch_members(&room.room_id).await;
        assert_eq!(next_ok(&mut query).await.len(), 1);

        // last member leaves; the room cascades away and the channel closes
        store.leave_room(&room.room_id, "user-1").await.unwrap();

        // the leave publishes several changes; every recompute after the
        // cascade must surface NotFound, and the query must then end
        let mut saw_error = false;
        while let Some(emission) = timeout(WAIT, query.next()).await.expect("timed out") {
            assert!(matches!(emission, Err(AppError::NotFound(_))));
            saw_error = true;
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn live_room_summaries_react_to_new_rooms() {
        let (store, stats, _room) = setup().await;

        let mut query = stats.watch_room_summaries("user-1").await;
        assert_eq!(next_ok(&mut query).await.len(), 1);

        let second = Room::new("Another Night".to_string());
        let creator = User::new("user-1".to_string(), "Alice".to_string(), None);
        store
            .create_room_with_creator(&second, &creator)
            .await
            .unwrap();

        // one emission per committed change; drain until both rooms show
        let mut latest = next_ok(&mut query).await;
        while latest.len() < 2 {
            latest = next_ok(&mut query).await;
        }
        assert_eq!(latest[0].room.name, "Another Night");
    }
}
