//! Per-match simulation state (owned by the supervisor task)

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ws::protocol::{EventType, MatchEvent, MatchId, Player, Score, TeamInfo};

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Running,
    HalfTimeAnnounced,
    Ended,
}

/// Which side an event is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

pub struct MatchSimulationState {
    pub match_id: MatchId,
    pub home_team: TeamInfo,
    pub away_team: TeamInfo,
    pub score: Score,
    pub current_minute: u32,
    pub events: Vec<MatchEvent>,
    pub start_time: DateTime<Utc>,
    pub lifecycle: Lifecycle,
}

impl MatchSimulationState {
    pub fn new(match_id: MatchId, home_team: TeamInfo, away_team: TeamInfo) -> Self {
        Self {
            match_id,
            home_team,
            away_team,
            score: Score::default(),
            current_minute: 0,
            events: Vec::new(),
            start_time: Utc::now(),
            lifecycle: Lifecycle::Running,
        }
    }

    pub fn team(&self, side: Side) -> &TeamInfo {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    pub fn home_roster(&self) -> &[Player] {
        self.home_team.roster.as_deref().unwrap_or(&[])
    }

    /// Append an event to the log, applying goals to the score
    pub fn record(&mut self, event: MatchEvent) {
        if event.event_type == EventType::Goal {
            if event.team_id == self.home_team.id {
                self.score.home += 1;
            } else {
                self.score.away += 1;
            }
        }
        self.events.push(event);
    }

    pub fn is_ended(&self) -> bool {
        self.lifecycle == Lifecycle::Ended
    }
}

/// Read-only view of a running match for queries
#[derive(Debug, Clone, Serialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub home_team: String,
    pub away_team: String,
    pub score: Score,
    pub current_minute: u32,
    pub event_count: usize,
    pub lifecycle: Lifecycle,
    pub start_time: DateTime<Utc>,
}

impl From<&MatchSimulationState> for MatchSnapshot {
    fn from(state: &MatchSimulationState) -> Self {
        Self {
            match_id: state.match_id,
            home_team: state.home_team.name.clone(),
            away_team: state.away_team.name.clone(),
            score: state.score,
            current_minute: state.current_minute,
            event_count: state.events.len(),
            lifecycle: state.lifecycle,
            start_time: state.start_time,
        }
    }
}
