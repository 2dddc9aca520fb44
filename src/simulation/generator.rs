//! Synthetic match event generation

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{EventType, MatchEvent, Player, PlayerId, Position};

use super::config::SimulationConfig;
use super::state::{MatchSimulationState, Side};

/// Random source used by the generator and supervisor.
/// Object safe so supervisors can hold any implementation.
pub trait MatchRng: Send {
    /// Uniform draw in `[0, 1)`
    fn unit(&mut self) -> f64;

    /// Uniform index in `[0, n)`; `n` is never zero
    fn below(&mut self, n: usize) -> usize;

    fn chance(&mut self, probability: f64) -> bool {
        self.unit() < probability
    }
}

/// Seeded ChaCha source used in production
pub struct SeededRng(ChaCha8Rng);

impl SeededRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl MatchRng for SeededRng {
    fn unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    fn below(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n.max(1))
    }
}

const FIRST_NAMES: &[&str] = &[
    "Lucas", "Mateo", "Jonas", "Kofi", "Ivan", "Diego", "Yusuf", "Hugo", "Rafael", "Emil",
];
const LAST_NAMES: &[&str] = &[
    "Silva", "Müller", "Okafor", "Petrov", "Garcia", "Jensen", "Rossi", "Novak", "Dubois", "Kim",
];
const OUTFIELD: &[Position] = &[Position::Defender, Position::Midfielder, Position::Forward];

/// Stateless event generator. All randomness comes from the caller's source.
#[derive(Clone)]
pub struct EventGenerator {
    config: Arc<SimulationConfig>,
}

impl EventGenerator {
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        Self { config }
    }

    /// Produce one random event for the current minute
    pub fn generate(&self, state: &MatchSimulationState, rng: &mut dyn MatchRng) -> MatchEvent {
        let side = if rng.chance(self.config.home_advantage) {
            Side::Home
        } else {
            Side::Away
        };
        let event_type = self.pick_event_type(rng);

        let player = if event_type.is_team_level() {
            None
        } else {
            self.pick_player(state, side, None, rng)
        };

        // Assists are only attributed on home goals
        let related_player = match (&player, event_type, side) {
            (Some(scorer), EventType::Goal, Side::Home)
                if rng.chance(self.config.assist_probability) =>
            {
                self.pick_player(state, Side::Home, Some(scorer.id), rng)
            }
            _ => None,
        };

        let team = state.team(side);
        MatchEvent {
            id: Uuid::new_v4(),
            match_id: state.match_id,
            event_type,
            minute: state.current_minute,
            timestamp: unix_millis(),
            team_id: team.id,
            team_name: team.name.clone(),
            player,
            related_player,
        }
    }

    /// Weighted draw over the event table; falls back to a goal
    pub fn pick_event_type(&self, rng: &mut dyn MatchRng) -> EventType {
        let weights = &self.config.weights;
        let roll = rng.unit() * weights.total();

        let mut cumulative = 0.0;
        for &(event_type, weight) in weights.entries() {
            cumulative += weight.max(0.0);
            if roll < cumulative {
                return event_type;
            }
        }
        EventType::Goal
    }

    /// Home players come from the roster, away players are synthesized
    pub fn pick_player(
        &self,
        state: &MatchSimulationState,
        side: Side,
        exclude: Option<PlayerId>,
        rng: &mut dyn MatchRng,
    ) -> Option<Player> {
        match side {
            Side::Home => {
                let candidates: Vec<&Player> = state
                    .home_roster()
                    .iter()
                    .filter(|p| Some(p.id) != exclude)
                    .collect();
                if candidates.is_empty() {
                    return None;
                }
                Some(candidates[rng.below(candidates.len())].clone())
            }
            Side::Away => Some(self.synthetic_opponent(rng)),
        }
    }

    fn synthetic_opponent(&self, rng: &mut dyn MatchRng) -> Player {
        let offset = rng.below(self.config.synthetic_id_span) as i64;
        let first = FIRST_NAMES[rng.below(FIRST_NAMES.len())];
        let last = LAST_NAMES[rng.below(LAST_NAMES.len())];
        let position = OUTFIELD[rng.below(OUTFIELD.len())];
        let jersey = rng.below(98) as u8 + 2;

        Player {
            id: self.config.synthetic_id_base + offset,
            name: format!("{} {}", first, last),
            position,
            jersey_number: Some(jersey),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;

    use super::MatchRng;

    /// Replays scripted draws; exhausted queues fall back to zero
    #[derive(Default)]
    pub struct ScriptedRng {
        units: VecDeque<f64>,
        indices: VecDeque<usize>,
    }

    impl ScriptedRng {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn units(mut self, values: &[f64]) -> Self {
            self.units.extend(values.iter().copied());
            self
        }

        pub fn indices(mut self, values: &[usize]) -> Self {
            self.indices.extend(values.iter().copied());
            self
        }
    }

    impl MatchRng for ScriptedRng {
        fn unit(&mut self) -> f64 {
            self.units.pop_front().unwrap_or(0.0)
        }

        fn below(&mut self, n: usize) -> usize {
            self.indices.pop_front().unwrap_or(0) % n.max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedRng;
    use super::*;
    use crate::simulation::config::EventWeights;
    use crate::ws::protocol::TeamInfo;

    fn player(id: PlayerId, position: Position) -> Player {
        Player {
            id,
            name: format!("Player {}", id),
            position,
            jersey_number: None,
        }
    }

    fn state_with_roster(roster: Vec<Player>) -> MatchSimulationState {
        let mut state = MatchSimulationState::new(
            42,
            TeamInfo {
                id: 1,
                name: "Home".to_string(),
                roster: Some(roster),
            },
            TeamInfo {
                id: 2,
                name: "Away".to_string(),
                roster: None,
            },
        );
        state.current_minute = 10;
        state
    }

    fn generator() -> EventGenerator {
        EventGenerator::new(Arc::new(SimulationConfig::default()))
    }

    #[test]
    fn weighted_draw_walks_cumulative_boundaries() {
        let generator = generator();
        // total 95: goal [0,15), shot on target [15,25), shot off target [25,40)
        let cases = [
            (0.0, EventType::Goal),
            (14.9 / 95.0, EventType::Goal),
            (20.0 / 95.0, EventType::ShotOnTarget),
            (30.0 / 95.0, EventType::ShotOffTarget),
            (94.9 / 95.0, EventType::Penalty),
        ];
        for (unit, expected) in cases {
            let mut rng = ScriptedRng::new().units(&[unit]);
            assert_eq!(generator.pick_event_type(&mut rng), expected, "unit {}", unit);
        }
    }

    #[test]
    fn empty_weight_table_falls_back_to_goal() {
        let config = SimulationConfig {
            weights: EventWeights::new(Vec::new()),
            ..SimulationConfig::default()
        };
        let generator = EventGenerator::new(Arc::new(config));
        let mut rng = ScriptedRng::new().units(&[0.5]);
        assert_eq!(generator.pick_event_type(&mut rng), EventType::Goal);
    }

    #[test]
    fn home_goal_with_assist_uses_distinct_players() {
        let state = state_with_roster(vec![
            player(10, Position::Forward),
            player(11, Position::Midfielder),
        ]);
        // home side, goal, assist granted
        let mut rng = ScriptedRng::new().units(&[0.1, 0.0, 0.5]).indices(&[0, 0]);

        let event = generator().generate(&state, &mut rng);

        assert_eq!(event.event_type, EventType::Goal);
        assert_eq!(event.minute, 10);
        assert_eq!(event.team_id, 1);
        assert_eq!(event.player.as_ref().map(|p| p.id), Some(10));
        assert_eq!(event.related_player.as_ref().map(|p| p.id), Some(11));
    }

    #[test]
    fn single_player_roster_goal_has_no_assist() {
        let state = state_with_roster(vec![player(10, Position::Forward)]);
        let mut rng = ScriptedRng::new().units(&[0.1, 0.0, 0.0]);

        let event = generator().generate(&state, &mut rng);

        assert_eq!(event.player.as_ref().map(|p| p.id), Some(10));
        assert!(event.related_player.is_none());
    }

    #[test]
    fn away_goals_never_carry_assists() {
        let state = state_with_roster(vec![player(10, Position::Forward)]);
        let mut rng = ScriptedRng::new().units(&[0.9, 0.0, 0.0]).indices(&[123]);

        let event = generator().generate(&state, &mut rng);

        assert_eq!(event.team_id, 2);
        let scorer = event.player.expect("away goal has a synthetic scorer");
        assert_eq!(scorer.id, 1_000_123);
        assert!(event.related_player.is_none());
    }

    #[test]
    fn synthetic_opponents_stay_in_reserved_range() {
        let generator = generator();
        let state = state_with_roster(vec![player(10, Position::Forward)]);
        let mut rng = SeededRng::from_seed(7);
        for _ in 0..200 {
            let p = generator.pick_player(&state, Side::Away, None, &mut rng).unwrap();
            assert!(p.id >= 1_000_000 && p.id < 1_100_000);
            assert_ne!(p.position, Position::Goalkeeper);
        }
    }

    #[test]
    fn corners_are_team_level() {
        let state = state_with_roster(vec![player(10, Position::Forward)]);
        // 45 of 95 lands inside the corner band [40,52)
        let mut rng = ScriptedRng::new().units(&[0.1, 45.0 / 95.0]);

        let event = generator().generate(&state, &mut rng);

        assert_eq!(event.event_type, EventType::Corner);
        assert!(event.player.is_none());
    }

    #[test]
    fn empty_home_roster_yields_no_player() {
        let state = state_with_roster(Vec::new());
        let mut rng = ScriptedRng::new().units(&[0.1, 0.0]);

        let event = generator().generate(&state, &mut rng);

        assert_eq!(event.event_type, EventType::Goal);
        assert!(event.player.is_none());
    }
}
