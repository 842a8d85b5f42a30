use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::types::{
    LeaveRoomResponse, MatchRecordedResponse, RecordMatchRequest, UpdateProfileRequest,
};
use crate::identity::{Identity, IdentityProvider};
use crate::shared::AppError;
use crate::store::{
    ChallengeStore, Game, LeaveRoomOutcome, Match, MatchResult, Outcome, Penalty, PenaltyTemplate,
    Player, Room, User,
};

/// Service for room lifecycle: creation, membership, games, match
/// recording, penalties, templates, and profile updates.
///
/// Validation happens here; atomicity of the compound writes lives in the
/// store. Every operation either fully applies or returns an error with
/// nothing written.
pub struct LifecycleService {
    store: Arc<dyn ChallengeStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn ChallengeStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Creates a room and enrolls the signed-in user as its first player.
    /// Bootstraps the user row from the identity when none exists yet.
    #[instrument(skip(self))]
    pub async fn create_room(&self, name: &str) -> Result<Room, AppError> {
        let identity = self.require_identity().await?;
        let name = non_blank(name, "Room name")?;

        let room = Room::new(name);
        let creator = User::new(
            identity.user_id.clone(),
            identity.display_name.clone(),
            identity.icon_url.clone(),
        );
        self.store.create_room_with_creator(&room, &creator).await?;

        info!(room_id = %room.room_id, user_id = %identity.user_id, "Room created");
        Ok(room)
    }

    /// Adds a guest player (no account) to a room
    #[instrument(skip(self))]
    pub async fn add_guest_player(
        &self,
        room_id: &str,
        guest_name: &str,
    ) -> Result<Player, AppError> {
        let guest_name = non_blank(guest_name, "Guest name")?;

        let player = Player::guest(room_id.to_string(), guest_name);
        self.store.insert_player(&player).await?;

        info!(room_id = %room_id, player_id = %player.player_id, "Guest added");
        Ok(player)
    }

    /// Removes the signed-in user from a room. When the last player row
    /// goes, the room and everything in it go with it.
    #[instrument(skip(self))]
    pub async fn leave_room(&self, room_id: &str) -> Result<LeaveRoomResponse, AppError> {
        let identity = self.require_identity().await?;

        match self.store.leave_room(room_id, &identity.user_id).await? {
            LeaveRoomOutcome::Left { remaining_players } => {
                info!(room_id = %room_id, remaining_players, "Player left room");
                Ok(LeaveRoomResponse {
                    room_deleted: false,
                    remaining_players,
                })
            }
            LeaveRoomOutcome::RoomDeleted => {
                info!(room_id = %room_id, "Last player left, room deleted");
                Ok(LeaveRoomResponse {
                    room_deleted: true,
                    remaining_players: 0,
                })
            }
            LeaveRoomOutcome::RoomNotFound => {
                Err(AppError::NotFound("Room not found".to_string()))
            }
            LeaveRoomOutcome::PlayerNotInRoom => Err(AppError::NotFound(
                "You are not a member of this room".to_string(),
            )),
        }
    }

    /// Registers a game in a room's catalog
    #[instrument(skip(self))]
    pub async fn add_game(&self, room_id: &str, name: &str) -> Result<Game, AppError> {
        let name = non_blank(name, "Game name")?;

        let game = Game::new(room_id.to_string(), name);
        self.store.insert_game(&game).await?;

        info!(room_id = %room_id, game_id = %game.game_id, "Game added");
        Ok(game)
    }

    pub async fn list_games(&self, room_id: &str) -> Result<Vec<Game>, AppError> {
        self.require_room(room_id).await?;
        self.store.games_in_room(room_id).await
    }

    /// Removes a game and every match, result, and penalty recorded for it
    #[instrument(skip(self))]
    pub async fn remove_game(&self, game_id: &str) -> Result<(), AppError> {
        self.store.delete_game(game_id).await?;
        info!(game_id = %game_id, "Game removed with its match history");
        Ok(())
    }

    /// Records a finished match: one result row per participant, and one
    /// pending penalty per loser when a penalty description is given.
    #[instrument(skip(self, request))]
    pub async fn record_match(
        &self,
        room_id: &str,
        request: RecordMatchRequest,
    ) -> Result<MatchRecordedResponse, AppError> {
        if request.winner_player_ids.is_empty() || request.loser_player_ids.is_empty() {
            return Err(AppError::InvalidArgument(
                "A match needs at least one winner and one loser".to_string(),
            ));
        }

        let winners: HashSet<&str> = request.winner_player_ids.iter().map(String::as_str).collect();
        let losers: HashSet<&str> = request.loser_player_ids.iter().map(String::as_str).collect();
        if winners.intersection(&losers).next().is_some() {
            return Err(AppError::InvalidArgument(
                "A player cannot both win and lose the same match".to_string(),
            ));
        }
        if winners.len() != request.winner_player_ids.len()
            || losers.len() != request.loser_player_ids.len()
        {
            return Err(AppError::InvalidArgument(
                "Duplicate player in match results".to_string(),
            ));
        }

        let games = self.store.games_in_room(room_id).await?;
        if !games.iter().any(|g| g.game_id == request.game_id) {
            return Err(AppError::NotFound(
                "Game not found in this room".to_string(),
            ));
        }

        let members: HashSet<String> = self
            .store
            .players_in_room(room_id)
            .await?
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        for player_id in winners.iter().chain(losers.iter()) {
            if !members.contains(*player_id) {
                return Err(AppError::InvalidArgument(format!(
                    "Player {player_id} is not a member of this room"
                )));
            }
        }

        let penalty_description = request
            .penalty_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let recorded = Match::new(room_id.to_string(), request.game_id.clone());
        let mut results = Vec::with_capacity(winners.len() + losers.len());
        let mut penalties = Vec::new();
        for player_id in &request.winner_player_ids {
            results.push(MatchResult::new(
                recorded.match_id.clone(),
                player_id.clone(),
                Outcome::Win,
            ));
        }
        for player_id in &request.loser_player_ids {
            results.push(MatchResult::new(
                recorded.match_id.clone(),
                player_id.clone(),
                Outcome::Loss,
            ));
            if let Some(description) = penalty_description {
                penalties.push(Penalty::new(
                    recorded.match_id.clone(),
                    player_id.clone(),
                    description.to_string(),
                ));
            }
        }

        self.store
            .record_match(&recorded, &results, &penalties)
            .await?;

        info!(
            room_id = %room_id,
            match_id = %recorded.match_id,
            results = results.len(),
            penalties = penalties.len(),
            "Match recorded"
        );
        Ok(MatchRecordedResponse {
            match_id: recorded.match_id,
            result_count: results.len(),
            penalty_count: penalties.len(),
        })
    }

    /// Marks a penalty done. Calling it again for the same penalty
    /// succeeds without changing anything.
    #[instrument(skip(self))]
    pub async fn complete_penalty(&self, penalty_id: &str) -> Result<(), AppError> {
        self.store.complete_penalty(penalty_id).await?;
        debug!(penalty_id = %penalty_id, "Penalty completed");
        Ok(())
    }

    /// The signed-in user's profile: the stored row when one exists,
    /// otherwise the identity's own fields (nothing is written on read).
    #[instrument(skip(self))]
    pub async fn current_profile(&self) -> Result<User, AppError> {
        let identity = self.require_identity().await?;

        match self.store.get_user(&identity.user_id).await? {
            Some(user) => Ok(user),
            None => Ok(User::new(
                identity.user_id,
                identity.display_name,
                identity.icon_url,
            )),
        }
    }

    /// Writes the user row. Member lists resolve names at read time, so
    /// no per-room data needs touching.
    #[instrument(skip(self, request))]
    pub async fn update_user_profile(&self, request: UpdateProfileRequest) -> Result<User, AppError> {
        let identity = self.require_identity().await?;
        let display_name = non_blank(&request.display_name, "Display name")?;

        let user = User::new(identity.user_id, display_name, request.icon_url);
        self.store.upsert_user(&user).await?;

        info!(user_id = %user.user_id, "Profile updated");
        Ok(user)
    }

    /// Saves a reusable penalty description for a room
    #[instrument(skip(self))]
    pub async fn add_penalty_template(
        &self,
        room_id: &str,
        description: &str,
    ) -> Result<PenaltyTemplate, AppError> {
        let description = non_blank(description, "Penalty description")?;

        let template = PenaltyTemplate::new(room_id.to_string(), description);
        self.store.insert_penalty_template(&template).await?;

        debug!(room_id = %room_id, template_id = %template.template_id, "Template added");
        Ok(template)
    }

    pub async fn list_penalty_templates(
        &self,
        room_id: &str,
    ) -> Result<Vec<PenaltyTemplate>, AppError> {
        self.require_room(room_id).await?;
        self.store.penalty_templates_in_room(room_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_penalty_template(&self, template_id: &str) -> Result<(), AppError> {
        self.store.delete_penalty_template(template_id).await
    }

    async fn require_identity(&self) -> Result<Identity, AppError> {
        self.identity
            .current_identity()
            .await
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))
    }

    async fn require_room(&self, room_id: &str) -> Result<(), AppError> {
        self.store
            .get_room(room_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))
    }
}

/// Trims the value and rejects empty input
fn non_blank(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityProvider;
    use crate::store::InMemoryStore;

    fn signed_in(user_id: &str, name: &str) -> Arc<InMemoryIdentityProvider> {
        Arc::new(InMemoryIdentityProvider::with_identity(Identity {
            user_id: user_id.to_string(),
            display_name: name.to_string(),
            icon_url: None,
        }))
    }

    fn service_with(
        identity: Arc<InMemoryIdentityProvider>,
    ) -> (Arc<InMemoryStore>, LifecycleService) {
        let store = Arc::new(InMemoryStore::new());
        let service = LifecycleService::new(store.clone(), identity);
        (store, service)
    }

    #[tokio::test]
    async fn create_room_requires_sign_in() {
        let (_, service) = service_with(Arc::new(InMemoryIdentityProvider::new()));
        let result = service.create_room("Game Night").await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn create_room_enrolls_creator() {
        let (store, service) = service_with(signed_in("user-1", "Alice"));

        let room = service.create_room("  Game Night  ").await.unwrap();
        assert_eq!(room.name, "Game Night");

        let players = store.players_in_room(&room.room_id).await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].user_id.as_deref(), Some("user-1"));

        let user = store.get_user("user-1").await.unwrap().unwrap();
        assert_eq!(user.display_name, "Alice");
    }

    #[tokio::test]
    async fn blank_room_name_is_rejected() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));
        let result = service.create_room("   ").await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn guest_requires_existing_room_and_name() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));
        let room = service.create_room("Game Night").await.unwrap();

        let result = service.add_guest_player(&room.room_id, " ").await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));

        let result = service.add_guest_player("no-such-room", "Bob").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let guest = service.add_guest_player(&room.room_id, "Bob").await.unwrap();
        assert!(guest.is_guest());
        assert_eq!(guest.guest_name.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn leave_room_reports_deletion_of_emptied_room() {
        let (store, service) = service_with(signed_in("user-1", "Alice"));
        let room = service.create_room("Game Night").await.unwrap();

        let response = service.leave_room(&room.room_id).await.unwrap();
        assert!(response.room_deleted);

        assert!(store.get_room(&room.room_id).await.unwrap().is_none());

        let again = service.leave_room(&room.room_id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn leave_room_counts_remaining_players() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));
        let room = service.create_room("Game Night").await.unwrap();
        service.add_guest_player(&room.room_id, "Bob").await.unwrap();

        let response = service.leave_room(&room.room_id).await.unwrap();
        assert!(!response.room_deleted);
        assert_eq!(response.remaining_players, 1);
    }

    async fn seeded_match_setup() -> (LifecycleService, Room, Game, Vec<Player>) {
        let (store, service) = service_with(signed_in("user-1", "Alice"));
        let room = service.create_room("Game Night").await.unwrap();
        let game = service.add_game(&room.room_id, "Catan").await.unwrap();
        service.add_guest_player(&room.room_id, "Bob").await.unwrap();
        let players = store.players_in_room(&room.room_id).await.unwrap();
        (service, room, game, players)
    }

    #[tokio::test]
    async fn record_match_writes_results_and_penalties() {
        let (service, room, game, players) = seeded_match_setup().await;

        let response = service
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: game.game_id.clone(),
                    winner_player_ids: vec![players[0].player_id.clone()],
                    loser_player_ids: vec![players[1].player_id.clone()],
                    penalty_description: Some("wash dishes".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.result_count, 2);
        assert_eq!(response.penalty_count, 1);
    }

    #[tokio::test]
    async fn record_match_skips_penalties_for_blank_description() {
        let (service, room, game, players) = seeded_match_setup().await;

        let response = service
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: game.game_id.clone(),
                    winner_player_ids: vec![players[0].player_id.clone()],
                    loser_player_ids: vec![players[1].player_id.clone()],
                    penalty_description: Some("   ".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.penalty_count, 0);
    }

    #[tokio::test]
    async fn record_match_rejects_overlapping_sides() {
        let (service, room, game, players) = seeded_match_setup().await;

        let result = service
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: game.game_id.clone(),
                    winner_player_ids: vec![players[0].player_id.clone()],
                    loser_player_ids: vec![
                        players[0].player_id.clone(),
                        players[1].player_id.clone(),
                    ],
                    penalty_description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn record_match_rejects_empty_sides() {
        let (service, room, game, players) = seeded_match_setup().await;

        let result = service
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: game.game_id.clone(),
                    winner_player_ids: vec![players[0].player_id.clone()],
                    loser_player_ids: vec![],
                    penalty_description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn record_match_rejects_outside_players() {
        let (service, room, game, players) = seeded_match_setup().await;

        let result = service
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: game.game_id.clone(),
                    winner_player_ids: vec![players[0].player_id.clone()],
                    loser_player_ids: vec!["stranger".to_string()],
                    penalty_description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn record_match_rejects_foreign_game() {
        let (service, room, _game, players) = seeded_match_setup().await;

        let result = service
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: "no-such-game".to_string(),
                    winner_player_ids: vec![players[0].player_id.clone()],
                    loser_player_ids: vec![players[1].player_id.clone()],
                    penalty_description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));

        // before any write, the profile mirrors the identity
        let profile = service.current_profile().await.unwrap();
        assert_eq!(profile.display_name, "Alice");

        let updated = service
            .update_user_profile(UpdateProfileRequest {
                display_name: "Alicia".to_string(),
                icon_url: Some("https://example/icon.png".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(updated.display_name, "Alicia");

        let profile = service.current_profile().await.unwrap();
        assert_eq!(profile.display_name, "Alicia");
        assert_eq!(profile.icon_url.as_deref(), Some("https://example/icon.png"));
    }

    #[tokio::test]
    async fn blank_display_name_is_rejected() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));
        let result = service
            .update_user_profile(UpdateProfileRequest {
                display_name: "  ".to_string(),
                icon_url: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn penalty_template_lifecycle() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));
        let room = service.create_room("Game Night").await.unwrap();

        let template = service
            .add_penalty_template(&room.room_id, "buy snacks")
            .await
            .unwrap();
        let templates = service.list_penalty_templates(&room.room_id).await.unwrap();
        assert_eq!(templates.len(), 1);

        service
            .remove_penalty_template(&template.template_id)
            .await
            .unwrap();
        assert!(service
            .list_penalty_templates(&room.room_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn remove_game_propagates_not_found() {
        let (_, service) = service_with(signed_in("user-1", "Alice"));
        let result = service.remove_game("no-such-game").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
