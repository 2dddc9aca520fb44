//! Folds a finished match's event log into per-player statistics

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{error, info};

use crate::store::{StatisticsSink, StatsDelta};
use crate::ws::protocol::{EventType, MatchEvent, MatchId, Player, PlayerId, Position, TeamId, TeamInfo};

/// Everything the aggregator needs once a match is over
#[derive(Debug, Clone)]
pub struct FinishedMatch {
    pub match_id: MatchId,
    pub home_team: TeamInfo,
    pub away_team: TeamInfo,
    pub events: Vec<MatchEvent>,
    pub season: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub submitted: usize,
    pub failed: usize,
}

/// Computed line for one player
#[derive(Debug, Clone)]
pub struct PlayerLine {
    pub player: Player,
    pub delta: StatsDelta,
}

/// Season label for a match date: July starts a new season
pub fn season_for(date: DateTime<Utc>) -> String {
    let year = date.year();
    if date.month() >= 7 {
        format!("{}/{}", year, year + 1)
    } else {
        format!("{}/{}", year - 1, year)
    }
}

/// Build one line per player in the roster/event union, ordered by player id
pub fn compute_player_lines(finished: &FinishedMatch) -> Vec<PlayerLine> {
    let mut lines: BTreeMap<PlayerId, PlayerLine> = BTreeMap::new();

    let mut enroll = |player: &Player, team_id: TeamId| {
        lines.entry(player.id).or_insert_with(|| PlayerLine {
            player: player.clone(),
            delta: StatsDelta {
                match_id: finished.match_id,
                team_id,
                matches_played: 1,
                ..StatsDelta::default()
            },
        });
    };

    for team in [&finished.home_team, &finished.away_team] {
        for player in team.roster.iter().flatten() {
            enroll(player, team.id);
        }
    }
    for event in &finished.events {
        if let Some(player) = &event.player {
            enroll(player, event.team_id);
        }
        if let Some(related) = &event.related_player {
            enroll(related, event.team_id);
        }
    }

    // Opponent shooting totals per defending team
    let mut on_target_against: BTreeMap<TeamId, u32> = BTreeMap::new();
    let mut goals_against: BTreeMap<TeamId, u32> = BTreeMap::new();

    for event in &finished.events {
        let defending = if event.team_id == finished.home_team.id {
            finished.away_team.id
        } else {
            finished.home_team.id
        };
        match event.event_type {
            EventType::Goal => *goals_against.entry(defending).or_default() += 1,
            EventType::ShotOnTarget => *on_target_against.entry(defending).or_default() += 1,
            _ => {}
        }

        if let Some(line) = event.player.as_ref().and_then(|p| lines.get_mut(&p.id)) {
            let delta = &mut line.delta;
            match event.event_type {
                EventType::Goal => {
                    delta.goals += 1;
                    delta.shots_on_target += 1;
                }
                EventType::ShotOnTarget => delta.shots_on_target += 1,
                EventType::ShotOffTarget => delta.shots_off_target += 1,
                EventType::CardYellow => delta.yellow_cards += 1,
                EventType::CardRed => delta.red_cards += 1,
                _ => {}
            }
        }

        if event.event_type == EventType::Goal {
            if let Some(line) = event.related_player.as_ref().and_then(|p| lines.get_mut(&p.id)) {
                line.delta.assists += 1;
            }
        }
    }

    for line in lines.values_mut() {
        if line.player.position == Position::Goalkeeper {
            let team = line.delta.team_id;
            line.delta.saves = on_target_against.get(&team).copied().unwrap_or(0);
            line.delta.goals_conceded = goals_against.get(&team).copied().unwrap_or(0);
        }
    }

    lines.into_values().collect()
}

/// Submits per-player statistics to the configured sink
#[derive(Clone)]
pub struct StatisticsAggregator {
    sink: Arc<dyn StatisticsSink>,
}

impl StatisticsAggregator {
    pub fn new(sink: Arc<dyn StatisticsSink>) -> Self {
        Self { sink }
    }

    /// Compute and submit every player's line. A failed submission is logged
    /// and the remaining players are still submitted.
    pub async fn aggregate(&self, finished: FinishedMatch) -> AggregationReport {
        let lines = compute_player_lines(&finished);
        let mut report = AggregationReport::default();

        for line in &lines {
            match self
                .sink
                .submit(line.player.id, &finished.season, &line.delta)
                .await
            {
                Ok(()) => report.submitted += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        match_id = finished.match_id,
                        player_id = line.player.id,
                        error = %e,
                        "Failed to submit player statistics"
                    );
                }
            }
        }

        info!(
            match_id = finished.match_id,
            season = %finished.season,
            submitted = report.submitted,
            failed = report.failed,
            "Match statistics aggregated"
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::store::{StatisticsSink, StatsDelta, StoreError};
    use crate::ws::protocol::PlayerId;

    /// Records submissions; listed player ids fail
    #[derive(Default)]
    pub struct RecordingSink {
        pub submissions: Mutex<Vec<(PlayerId, String, StatsDelta)>>,
        pub failing: Vec<PlayerId>,
        /// Latency added to every submission
        pub delay: Duration,
    }

    impl RecordingSink {
        pub fn failing(ids: &[PlayerId]) -> Self {
            Self {
                failing: ids.to_vec(),
                ..Self::default()
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn submitted_ids(&self) -> Vec<PlayerId> {
            self.submissions.lock().iter().map(|(id, _, _)| *id).collect()
        }
    }

    #[async_trait]
    impl StatisticsSink for RecordingSink {
        async fn submit(
            &self,
            player_id: PlayerId,
            season: &str,
            delta: &StatsDelta,
        ) -> Result<(), StoreError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.contains(&player_id) {
                return Err(StoreError::Api {
                    status: 503,
                    body: format!("player {} unavailable", player_id),
                });
            }
            self.submissions
                .lock()
                .push((player_id, season.to_string(), delta.clone()));
            Ok(())
        }
    }
}
