//! Per-match supervisor: owns one match's state and its tick loop

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{EventType, MatchEvent, ServerMsg};

use super::config::SimulationConfig;
use super::generator::{EventGenerator, MatchRng};
use super::state::{Lifecycle, MatchSimulationState, MatchSnapshot};
use super::stats::{season_for, AggregationReport, FinishedMatch, StatisticsAggregator};
use super::MatchBroadcast;

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Ended,
}

pub struct MatchSupervisor {
    state: MatchSimulationState,
    config: Arc<SimulationConfig>,
    generator: EventGenerator,
    rng: Box<dyn MatchRng>,
    broadcast: Arc<dyn MatchBroadcast>,
    aggregator: StatisticsAggregator,
    snapshot: Arc<RwLock<MatchSnapshot>>,
    /// Statistics dispatch started by the tick that reached full time
    aggregation: Option<JoinHandle<AggregationReport>>,
}

impl MatchSupervisor {
    pub fn new(
        state: MatchSimulationState,
        config: Arc<SimulationConfig>,
        rng: Box<dyn MatchRng>,
        broadcast: Arc<dyn MatchBroadcast>,
        aggregator: StatisticsAggregator,
    ) -> Self {
        let snapshot = Arc::new(RwLock::new(MatchSnapshot::from(&state)));
        Self {
            generator: EventGenerator::new(config.clone()),
            state,
            config,
            rng,
            broadcast,
            aggregator,
            snapshot,
            aggregation: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &MatchSimulationState {
        &self.state
    }

    /// Shared view updated after every change
    pub fn snapshot_handle(&self) -> Arc<RwLock<MatchSnapshot>> {
        self.snapshot.clone()
    }

    /// Emit the kick-off event
    pub fn begin(&mut self) {
        let kickoff = self.team_event(EventType::MatchStart);
        self.emit(kickoff);
        info!(
            match_id = self.state.match_id,
            home = %self.state.home_team.name,
            away = %self.state.away_team.name,
            "Match simulation started"
        );
    }

    /// Advance the clock by one step
    pub fn tick(&mut self) -> TickOutcome {
        if self.state.is_ended() {
            return TickOutcome::Ended;
        }

        self.state.current_minute += self.config.minutes_per_tick;
        let minute = self.state.current_minute;

        if minute == self.config.half_time_minute
            && self.state.lifecycle == Lifecycle::Running
        {
            let half_time = self.team_event(EventType::HalfTime);
            self.emit(half_time);
            self.state.lifecycle = Lifecycle::HalfTimeAnnounced;
        }

        if minute >= self.config.full_time_minute {
            self.aggregation = self.end();
            return TickOutcome::Ended;
        }

        if self.rng.chance(self.config.event_probability) {
            let event = self.generator.generate(&self.state, self.rng.as_mut());
            debug!(
                match_id = self.state.match_id,
                minute,
                event_type = ?event.event_type,
                "Generated match event"
            );
            self.emit(event);
        } else {
            self.refresh_snapshot();
        }

        TickOutcome::Continue
    }

    /// Finish the match. Only the first call broadcasts and dispatches statistics.
    pub fn end(&mut self) -> Option<JoinHandle<AggregationReport>> {
        if self.state.is_ended() {
            return None;
        }
        self.state.lifecycle = Lifecycle::Ended;

        let final_whistle = self.team_event(EventType::MatchEnd);
        self.emit(final_whistle);

        self.broadcast.broadcast(
            self.state.match_id,
            ServerMsg::MatchEnded {
                match_id: self.state.match_id,
                score: self.state.score,
                events: self.state.events.clone(),
            },
        );

        info!(
            match_id = self.state.match_id,
            minute = self.state.current_minute,
            home = self.state.score.home,
            away = self.state.score.away,
            events = self.state.events.len(),
            "Match simulation ended"
        );

        let finished = FinishedMatch {
            match_id: self.state.match_id,
            home_team: self.state.home_team.clone(),
            away_team: self.state.away_team.clone(),
            events: self.state.events.clone(),
            season: self
                .config
                .season
                .clone()
                .unwrap_or_else(|| season_for(self.state.start_time)),
        };
        let aggregator = self.aggregator.clone();
        Some(tokio::spawn(async move { aggregator.aggregate(finished).await }))
    }

    /// Run the timer loop until full time or a stop signal.
    /// Returns the pending statistics dispatch so the caller can wait on it.
    pub async fn run(
        mut self,
        mut stop_rx: watch::Receiver<bool>,
    ) -> Option<JoinHandle<AggregationReport>> {
        let period = self.config.tick_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.tick() == TickOutcome::Ended {
                        break;
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        info!(match_id = self.state.match_id, "Stop requested, ending match early");
                        self.aggregation = self.end();
                        break;
                    }
                }
            }
        }

        self.aggregation.take()
    }

    fn team_event(&self, event_type: EventType) -> MatchEvent {
        MatchEvent {
            id: Uuid::new_v4(),
            match_id: self.state.match_id,
            event_type,
            minute: self.state.current_minute,
            timestamp: unix_millis(),
            team_id: self.state.home_team.id,
            team_name: self.state.home_team.name.clone(),
            player: None,
            related_player: None,
        }
    }

    /// Append to the log, then broadcast in log order
    fn emit(&mut self, event: MatchEvent) {
        self.state.record(event.clone());
        self.refresh_snapshot();
        self.broadcast
            .broadcast(self.state.match_id, ServerMsg::MatchEvent { event });
    }

    fn refresh_snapshot(&self) {
        *self.snapshot.write() = MatchSnapshot::from(&self.state);
    }
}
