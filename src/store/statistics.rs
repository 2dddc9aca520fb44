//! Per-player per-season statistics persistence

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ws::protocol::{MatchId, PlayerId, TeamId};

use super::supabase::{StoreError, SupabaseClient};

/// One player's contribution from a single finished match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsDelta {
    pub match_id: MatchId,
    pub team_id: TeamId,
    pub matches_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub shots_on_target: u32,
    pub shots_off_target: u32,
    pub saves: u32,
    pub goals_conceded: u32,
}

/// Aggregate record as stored in `player_statistics`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSeasonStats {
    pub player_id: PlayerId,
    pub season: String,
    pub matches_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub shots_on_target: u32,
    pub shots_off_target: u32,
    pub saves: u32,
    pub goals_conceded: u32,
    /// Last match folded into this record
    #[serde(default)]
    pub last_match_id: Option<MatchId>,
}

impl PlayerSeasonStats {
    pub fn new(player_id: PlayerId, season: &str) -> Self {
        Self {
            player_id,
            season: season.to_string(),
            ..Self::default()
        }
    }

    /// Whether this delta was already folded in
    pub fn has_applied(&self, delta: &StatsDelta) -> bool {
        self.last_match_id == Some(delta.match_id)
    }

    pub fn apply(&mut self, delta: &StatsDelta) {
        self.matches_played += delta.matches_played;
        self.goals += delta.goals;
        self.assists += delta.assists;
        self.yellow_cards += delta.yellow_cards;
        self.red_cards += delta.red_cards;
        self.shots_on_target += delta.shots_on_target;
        self.shots_off_target += delta.shots_off_target;
        self.saves += delta.saves;
        self.goals_conceded += delta.goals_conceded;
        self.last_match_id = Some(delta.match_id);
    }
}

/// Destination for finished-match statistics
#[async_trait]
pub trait StatisticsSink: Send + Sync {
    async fn submit(
        &self,
        player_id: PlayerId,
        season: &str,
        delta: &StatsDelta,
    ) -> Result<(), StoreError>;
}

const STATS_TABLE: &str = "player_statistics";

#[derive(Clone)]
pub struct SupabaseStatsSink {
    client: SupabaseClient,
}

impl SupabaseStatsSink {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn record_query(player_id: PlayerId, season: &str) -> String {
        format!("player_id=eq.{}&season=eq.{}", player_id, season)
    }
}

#[async_trait]
impl StatisticsSink for SupabaseStatsSink {
    async fn submit(
        &self,
        player_id: PlayerId,
        season: &str,
        delta: &StatsDelta,
    ) -> Result<(), StoreError> {
        let query = Self::record_query(player_id, season);
        let existing: Option<PlayerSeasonStats> = self.client.get_one(STATS_TABLE, &query).await?;

        match existing {
            None => {
                let mut record = PlayerSeasonStats::new(player_id, season);
                record.apply(delta);
                let _: PlayerSeasonStats = self.client.insert(STATS_TABLE, &record).await?;
                info!(player_id, season, "Created season statistics record");
            }
            Some(record) if record.has_applied(delta) => {
                debug!(player_id, match_id = delta.match_id, "Statistics already applied, skipping");
            }
            Some(mut record) => {
                record.apply(delta);
                self.client.update(STATS_TABLE, &query, &record).await?;
            }
        }
        Ok(())
    }
}

/// In-process statistics table
#[derive(Default)]
pub struct InMemoryStatsSink {
    records: DashMap<(PlayerId, String), PlayerSeasonStats>,
}

impl InMemoryStatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, player_id: PlayerId, season: &str) -> Option<PlayerSeasonStats> {
        self.records
            .get(&(player_id, season.to_string()))
            .map(|r| r.value().clone())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl StatisticsSink for InMemoryStatsSink {
    async fn submit(
        &self,
        player_id: PlayerId,
        season: &str,
        delta: &StatsDelta,
    ) -> Result<(), StoreError> {
        let mut record = self
            .records
            .entry((player_id, season.to_string()))
            .or_insert_with(|| PlayerSeasonStats::new(player_id, season));

        if record.has_applied(delta) {
            debug!(player_id, match_id = delta.match_id, "Statistics already applied, skipping");
            return Ok(());
        }
        record.apply(delta);
        Ok(())
    }
}
