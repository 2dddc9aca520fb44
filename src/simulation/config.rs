//! Simulation tuning: clock, probabilities and the event weight table

use std::time::Duration;

use crate::ws::protocol::EventType;

/// Relative weights for randomly generated event types
#[derive(Debug, Clone)]
pub struct EventWeights {
    entries: Vec<(EventType, f64)>,
}

impl EventWeights {
    pub fn new(entries: Vec<(EventType, f64)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(EventType, f64)] {
        &self.entries
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w.max(0.0)).sum()
    }
}

impl Default for EventWeights {
    fn default() -> Self {
        Self::new(vec![
            (EventType::Goal, 15.0),
            (EventType::ShotOnTarget, 10.0),
            (EventType::ShotOffTarget, 15.0),
            (EventType::Corner, 12.0),
            (EventType::Foul, 20.0),
            (EventType::CardYellow, 8.0),
            (EventType::CardRed, 2.0),
            (EventType::Offside, 10.0),
            (EventType::Penalty, 3.0),
        ])
    }
}

/// Simulation configuration shared by the generator and every supervisor
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Wall-clock time between ticks
    pub tick_interval: Duration,
    /// In-game minutes added per tick
    pub minutes_per_tick: u32,
    pub half_time_minute: u32,
    pub full_time_minute: u32,
    /// Chance that a tick produces a random event
    pub event_probability: f64,
    /// Chance that a random event is attributed to the home side
    pub home_advantage: f64,
    /// Chance that a home goal carries an assist
    pub assist_probability: f64,
    /// First id of the range reserved for synthetic opponents
    pub synthetic_id_base: i64,
    /// Width of the synthetic id range
    pub synthetic_id_span: usize,
    /// Season label override for statistics records
    pub season: Option<String>,
    pub weights: EventWeights,
    /// How long shutdown waits for pending statistics submissions
    pub stats_flush_timeout: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(5000),
            minutes_per_tick: 5,
            half_time_minute: 45,
            full_time_minute: 90,
            event_probability: 0.4,
            home_advantage: 0.6,
            assist_probability: 0.8,
            synthetic_id_base: 1_000_000,
            synthetic_id_span: 100_000,
            season: None,
            weights: EventWeights::default(),
            stats_flush_timeout: Duration::from_secs(10),
        }
    }
}
