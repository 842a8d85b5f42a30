use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::models::{Game, Match, MatchResult, Penalty, PenaltyTemplate, Player, Room, User};
use super::{ChallengeStore, LeaveRoomOutcome};
use crate::event::{ChangeFeed, StoreChange};
use crate::shared::AppError;

/// All tables of the in-memory store. One mutex guards the whole struct,
/// so every store operation is a serialized transaction: compound
/// operations observe and mutate a consistent snapshot, and the
/// last-player membership check can never race the room delete.
#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    rooms: HashMap<String, Room>,
    players: HashMap<String, Player>,
    games: HashMap<String, Game>,
    matches: HashMap<String, Match>,
    results: HashMap<String, MatchResult>,
    penalties: HashMap<String, Penalty>,
    templates: HashMap<String, PenaltyTemplate>,
}

impl Tables {
    fn room_id_of_match(&self, match_id: &str) -> Option<String> {
        self.matches.get(match_id).map(|m| m.room_id.clone())
    }

    /// Removes a room and every row that hangs off it
    fn cascade_delete_room(&mut self, room_id: &str) {
        let match_ids: Vec<String> = self
            .matches
            .values()
            .filter(|m| m.room_id == room_id)
            .map(|m| m.match_id.clone())
            .collect();

        self.results.retain(|_, r| !match_ids.contains(&r.match_id));
        self.penalties
            .retain(|_, p| !match_ids.contains(&p.match_id));
        self.matches.retain(|_, m| m.room_id != room_id);
        self.games.retain(|_, g| g.room_id != room_id);
        self.players.retain(|_, p| p.room_id != room_id);
        self.templates.retain(|_, t| t.room_id != room_id);
        self.rooms.remove(room_id);
    }

    /// Removes a game and the matches recorded for it
    fn cascade_delete_game(&mut self, game_id: &str) {
        let match_ids: Vec<String> = self
            .matches
            .values()
            .filter(|m| m.game_id == game_id)
            .map(|m| m.match_id.clone())
            .collect();

        self.results.retain(|_, r| !match_ids.contains(&r.match_id));
        self.penalties
            .retain(|_, p| !match_ids.contains(&p.match_id));
        self.matches.retain(|_, m| m.game_id != game_id);
        self.games.remove(game_id);
    }
}

/// In-memory implementation of `ChallengeStore` for development and testing
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    feed: ChangeFeed,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            feed: ChangeFeed::new(),
        }
    }

    /// Publishes changes collected while the table lock was held.
    /// The lock is always released before this runs.
    async fn publish_all(&self, changes: Vec<StoreChange>) {
        for change in changes {
            self.feed.publish(change).await;
        }
    }
}

#[async_trait]
impl ChallengeStore for InMemoryStore {
    #[instrument(skip(self, user))]
    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        {
            let mut tables = self.tables.lock().unwrap();
            tables.users.insert(user.user_id.clone(), user.clone());
        }
        debug!(user_id = %user.user_id, "User row written");

        self.publish_all(vec![StoreChange::UserProfileChanged {
            user_id: user.user_id.clone(),
        }])
        .await;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.get(user_id).cloned())
    }

    #[instrument(skip(self, room, creator))]
    async fn create_room_with_creator(&self, room: &Room, creator: &User) -> Result<(), AppError> {
        let changes;
        {
            let mut tables = self.tables.lock().unwrap();
            if tables.rooms.contains_key(&room.room_id) {
                warn!(room_id = %room.room_id, "Room already exists");
                return Err(AppError::Conflict("Room already exists".to_string()));
            }

            // Bootstrap the user row on first use; never clobber an
            // existing profile here.
            tables
                .users
                .entry(creator.user_id.clone())
                .or_insert_with(|| creator.clone());

            tables.rooms.insert(room.room_id.clone(), room.clone());

            let creator_player = Player::for_user(room.room_id.clone(), creator.user_id.clone());
            let player_id = creator_player.player_id.clone();
            tables
                .players
                .insert(creator_player.player_id.clone(), creator_player);

            changes = vec![
                StoreChange::RoomCreated {
                    room_id: room.room_id.clone(),
                },
                StoreChange::PlayerAdded {
                    room_id: room.room_id.clone(),
                    player_id,
                },
            ];
        }

        info!(room_id = %room.room_id, creator = %creator.user_id, "Room created with creator");
        self.publish_all(changes).await;
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.rooms.get(room_id).cloned())
    }

    async fn rooms_for_user(&self, user_id: &str) -> Result<Vec<Room>, AppError> {
        let tables = self.tables.lock().unwrap();
        let rooms = tables
            .players
            .values()
            .filter(|p| p.user_id.as_deref() == Some(user_id))
            .filter_map(|p| tables.rooms.get(&p.room_id).cloned())
            .collect();
        Ok(rooms)
    }

    #[instrument(skip(self, player))]
    async fn insert_player(&self, player: &Player) -> Result<(), AppError> {
        {
            let mut tables = self.tables.lock().unwrap();
            if !tables.rooms.contains_key(&player.room_id) {
                return Err(AppError::NotFound("Room not found".to_string()));
            }
            tables
                .players
                .insert(player.player_id.clone(), player.clone());
        }

        self.publish_all(vec![StoreChange::PlayerAdded {
            room_id: player.room_id.clone(),
            player_id: player.player_id.clone(),
        }])
        .await;
        Ok(())
    }

    async fn players_in_room(&self, room_id: &str) -> Result<Vec<Player>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .players
            .values()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn leave_room(&self, room_id: &str, user_id: &str) -> Result<LeaveRoomOutcome, AppError> {
        let (outcome, changes) = {
            let mut tables = self.tables.lock().unwrap();

            if !tables.rooms.contains_key(room_id) {
                debug!(room_id = %room_id, "Room not found");
                return Ok(LeaveRoomOutcome::RoomNotFound);
            }

            let player_id = tables
                .players
                .values()
                .find(|p| p.room_id == room_id && p.user_id.as_deref() == Some(user_id))
                .map(|p| p.player_id.clone());

            let Some(player_id) = player_id else {
                debug!(room_id = %room_id, user_id = %user_id, "Player not in room");
                return Ok(LeaveRoomOutcome::PlayerNotInRoom);
            };

            tables.players.remove(&player_id);

            // Membership count check and room delete happen under the same
            // guard as the removal above.
            let remaining = tables
                .players
                .values()
                .filter(|p| p.room_id == room_id)
                .count();

            if remaining == 0 {
                tables.cascade_delete_room(room_id);
                (
                    LeaveRoomOutcome::RoomDeleted,
                    vec![
                        StoreChange::PlayerRemoved {
                            room_id: room_id.to_string(),
                            player_id,
                        },
                        StoreChange::RoomDeleted {
                            room_id: room_id.to_string(),
                        },
                    ],
                )
            } else {
                (
                    LeaveRoomOutcome::Left {
                        remaining_players: remaining,
                    },
                    vec![StoreChange::PlayerRemoved {
                        room_id: room_id.to_string(),
                        player_id,
                    }],
                )
            }
        };

        info!(room_id = %room_id, user_id = %user_id, outcome = ?outcome, "Leave room applied");
        let room_deleted = matches!(outcome, LeaveRoomOutcome::RoomDeleted);
        self.publish_all(changes).await;
        if room_deleted {
            self.feed.close_room(room_id).await;
        }
        Ok(outcome)
    }

    #[instrument(skip(self, game))]
    async fn insert_game(&self, game: &Game) -> Result<(), AppError> {
        {
            let mut tables = self.tables.lock().unwrap();
            if !tables.rooms.contains_key(&game.room_id) {
                return Err(AppError::NotFound("Room not found".to_string()));
            }
            tables.games.insert(game.game_id.clone(), game.clone());
        }

        self.publish_all(vec![StoreChange::GameAdded {
            room_id: game.room_id.clone(),
            game_id: game.game_id.clone(),
        }])
        .await;
        Ok(())
    }

    async fn games_in_room(&self, room_id: &str) -> Result<Vec<Game>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .games
            .values()
            .filter(|g| g.room_id == room_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_game(&self, game_id: &str) -> Result<(), AppError> {
        let room_id;
        {
            let mut tables = self.tables.lock().unwrap();
            let Some(game) = tables.games.get(game_id) else {
                return Err(AppError::NotFound("Game not found".to_string()));
            };
            room_id = game.room_id.clone();
            tables.cascade_delete_game(game_id);
        }

        self.publish_all(vec![StoreChange::GameRemoved {
            room_id,
            game_id: game_id.to_string(),
        }])
        .await;
        Ok(())
    }

    #[instrument(skip(self, recorded, results, penalties))]
    async fn record_match(
        &self,
        recorded: &Match,
        results: &[MatchResult],
        penalties: &[Penalty],
    ) -> Result<(), AppError> {
        {
            let mut tables = self.tables.lock().unwrap();
            if !tables.rooms.contains_key(&recorded.room_id) {
                return Err(AppError::NotFound("Room not found".to_string()));
            }
            if !tables.games.contains_key(&recorded.game_id) {
                return Err(AppError::NotFound("Game not found".to_string()));
            }

            let mut participants = std::collections::HashSet::new();
            for result in results {
                if !participants.insert(result.player_id.as_str()) {
                    return Err(AppError::InvalidArgument(
                        "A player can hold only one result per match".to_string(),
                    ));
                }
            }

            // Membership is re-checked under the same lock as the insert,
            // so a concurrent leave cannot slip a departed player into
            // the results.
            let in_room = |player_id: &str| {
                tables
                    .players
                    .get(player_id)
                    .is_some_and(|p| p.room_id == recorded.room_id)
            };
            for result in results {
                if !in_room(&result.player_id) {
                    return Err(AppError::InvalidArgument(format!(
                        "Player {} is not a member of this room",
                        result.player_id
                    )));
                }
            }
            for penalty in penalties {
                if !in_room(&penalty.assignee_player_id) {
                    return Err(AppError::InvalidArgument(format!(
                        "Player {} is not a member of this room",
                        penalty.assignee_player_id
                    )));
                }
            }

            tables
                .matches
                .insert(recorded.match_id.clone(), recorded.clone());
            for result in results {
                tables
                    .results
                    .insert(result.result_id.clone(), result.clone());
            }
            for penalty in penalties {
                tables
                    .penalties
                    .insert(penalty.penalty_id.clone(), penalty.clone());
            }
        }

        info!(
            room_id = %recorded.room_id,
            match_id = %recorded.match_id,
            results = results.len(),
            penalties = penalties.len(),
            "Match recorded"
        );
        self.publish_all(vec![StoreChange::MatchRecorded {
            room_id: recorded.room_id.clone(),
            match_id: recorded.match_id.clone(),
        }])
        .await;
        Ok(())
    }

    async fn matches_in_room(&self, room_id: &str) -> Result<Vec<Match>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .matches
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn results_for_match(&self, match_id: &str) -> Result<Vec<MatchResult>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .results
            .values()
            .filter(|r| r.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn penalties_in_room(&self, room_id: &str) -> Result<Vec<Penalty>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .penalties
            .values()
            .filter(|p| {
                tables
                    .room_id_of_match(&p.match_id)
                    .is_some_and(|r| r == room_id)
            })
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn complete_penalty(&self, penalty_id: &str) -> Result<(), AppError> {
        let change;
        {
            let mut tables = self.tables.lock().unwrap();
            let room_id = {
                let Some(penalty) = tables.penalties.get(penalty_id) else {
                    return Err(AppError::NotFound("Penalty not found".to_string()));
                };
                if penalty.is_completed {
                    debug!(penalty_id = %penalty_id, "Penalty already completed");
                    return Ok(());
                }
                tables.room_id_of_match(&penalty.match_id)
            };

            if let Some(penalty) = tables.penalties.get_mut(penalty_id) {
                penalty.is_completed = true;
            }

            change = room_id.map(|room_id| StoreChange::PenaltyCompleted {
                room_id,
                penalty_id: penalty_id.to_string(),
            });
        }

        match change {
            Some(change) => self.publish_all(vec![change]).await,
            None => warn!(penalty_id = %penalty_id, "Completed penalty has no parent match"),
        }
        Ok(())
    }

    #[instrument(skip(self, template))]
    async fn insert_penalty_template(&self, template: &PenaltyTemplate) -> Result<(), AppError> {
        {
            let mut tables = self.tables.lock().unwrap();
            if !tables.rooms.contains_key(&template.room_id) {
                return Err(AppError::NotFound("Room not found".to_string()));
            }
            tables
                .templates
                .insert(template.template_id.clone(), template.clone());
        }

        self.publish_all(vec![StoreChange::TemplateAdded {
            room_id: template.room_id.clone(),
            template_id: template.template_id.clone(),
        }])
        .await;
        Ok(())
    }

    async fn penalty_templates_in_room(
        &self,
        room_id: &str,
    ) -> Result<Vec<PenaltyTemplate>, AppError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .templates
            .values()
            .filter(|t| t.room_id == room_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn delete_penalty_template(&self, template_id: &str) -> Result<(), AppError> {
        let room_id;
        {
            let mut tables = self.tables.lock().unwrap();
            let Some(template) = tables.templates.remove(template_id) else {
                return Err(AppError::NotFound("Penalty template not found".to_string()));
            };
            room_id = template.room_id;
        }

        self.publish_all(vec![StoreChange::TemplateRemoved {
            room_id,
            template_id: template_id.to_string(),
        }])
        .await;
        Ok(())
    }

    async fn watch_room(&self, room_id: &str) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe_room(room_id).await
    }

    async fn watch_all(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe_all()
    }
}
