//! Team roster lookup

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::ws::protocol::{Player, PlayerId, Position, TeamId};

use super::supabase::{StoreError, SupabaseClient};

/// Source of real players for home-side attribution
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn home_roster(&self, team_id: TeamId) -> Result<Vec<Player>, StoreError>;
}

/// Row shape of the `players` table
#[derive(Debug, Deserialize)]
struct PlayerRow {
    id: PlayerId,
    name: String,
    position: Position,
    #[serde(default)]
    jersey_number: Option<u8>,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            id: row.id,
            name: row.name,
            position: row.position,
            jersey_number: row.jersey_number,
        }
    }
}

#[derive(Clone)]
pub struct SupabaseRosterProvider {
    client: SupabaseClient,
}

impl SupabaseRosterProvider {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RosterProvider for SupabaseRosterProvider {
    async fn home_roster(&self, team_id: TeamId) -> Result<Vec<Player>, StoreError> {
        let query = format!(
            "team_id=eq.{}&select=id,name,position,jersey_number&order=jersey_number.asc",
            team_id
        );
        let rows: Vec<PlayerRow> = self.client.get("players", &query).await?;
        Ok(rows.into_iter().map(Player::from).collect())
    }
}

/// Roster table held in memory; unknown teams have empty rosters
#[derive(Default)]
pub struct InMemoryRoster {
    teams: DashMap<TeamId, Vec<Player>>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn set_roster(&self, team_id: TeamId, players: Vec<Player>) {
        self.teams.insert(team_id, players);
    }
}

#[async_trait]
impl RosterProvider for InMemoryRoster {
    async fn home_roster(&self, team_id: TeamId) -> Result<Vec<Player>, StoreError> {
        Ok(self
            .teams
            .get(&team_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roster_lookup() {
        let roster = InMemoryRoster::new();
        roster.set_roster(
            3,
            vec![Player {
                id: 9,
                name: "Striker".to_string(),
                position: Position::Forward,
                jersey_number: Some(9),
            }],
        );

        assert_eq!(roster.home_roster(3).await.unwrap().len(), 1);
        assert!(roster.home_roster(4).await.unwrap().is_empty());
    }

    #[test]
    fn player_rows_deserialize() {
        let rows: Vec<PlayerRow> = serde_json::from_str(
            r#"[{"id": 1, "name": "Keeper", "position": "GOALKEEPER", "jersey_number": null}]"#,
        )
        .unwrap();
        let player = Player::from(rows.into_iter().next().unwrap());
        assert_eq!(player.position, Position::Goalkeeper);
        assert_eq!(player.jersey_number, None);
    }
}
