use challengelog::room::types::{MatchRecordedResponse, RecordMatchRequest};
use challengelog::shared::AppError;
use challengelog::store::{ChallengeStore, Game, Player, Room};

use super::setup::TestSetup;

impl TestSetup {
    pub async fn create_room(&self, name: &str) -> Room {
        self.lifecycle.create_room(name).await.unwrap()
    }

    pub async fn add_guest(&self, room: &Room, guest_name: &str) -> Player {
        self.lifecycle
            .add_guest_player(&room.room_id, guest_name)
            .await
            .unwrap()
    }

    pub async fn add_game(&self, room: &Room, name: &str) -> Game {
        self.lifecycle.add_game(&room.room_id, name).await.unwrap()
    }

    /// The creator's player row for a room the signed-in user created
    pub async fn player_of(&self, room: &Room, user_id: &str) -> Player {
        self.store
            .players_in_room(&room.room_id)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.user_id.as_deref() == Some(user_id))
            .unwrap()
    }

    pub async fn record_match(
        &self,
        room: &Room,
        game: &Game,
        winners: &[&Player],
        losers: &[&Player],
        penalty_description: Option<&str>,
    ) -> Result<MatchRecordedResponse, AppError> {
        self.lifecycle
            .record_match(
                &room.room_id,
                RecordMatchRequest {
                    game_id: game.game_id.clone(),
                    winner_player_ids: winners.iter().map(|p| p.player_id.clone()).collect(),
                    loser_player_ids: losers.iter().map(|p| p.player_id.clone()).collect(),
                    penalty_description: penalty_description.map(str::to_string),
                },
            )
            .await
    }

    /// Win/loss counts for one player by display name
    pub async fn counts_for(&self, room: &Room, display_name: &str) -> (usize, usize) {
        let standings = self
            .stats
            .player_standings(&room.room_id, None)
            .await
            .unwrap();
        let row = standings
            .iter()
            .find(|s| s.member.display_name() == display_name)
            .unwrap_or_else(|| panic!("no standing row for {display_name}"));
        (row.win_count, row.loss_count)
    }
}
