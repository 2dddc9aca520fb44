//! Registry of running simulations and their lifecycle

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::store::{RosterProvider, StoreError};
use crate::ws::protocol::{MatchId, TeamId, TeamInfo};

use super::config::SimulationConfig;
use super::generator::{MatchRng, SeededRng};
use super::state::{MatchSimulationState, MatchSnapshot};
use super::stats::{AggregationReport, StatisticsAggregator};
use super::supervisor::MatchSupervisor;
use super::MatchBroadcast;

/// Builds the random source for a new match
pub type RngFactory = Arc<dyn Fn(MatchId) -> Box<dyn MatchRng> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Match {0} is already running")]
    AlreadyRunning(MatchId),

    #[error("Match {0} is not running")]
    NotRunning(MatchId),

    #[error("Failed to load roster for team {team_id}: {source}")]
    Roster {
        team_id: TeamId,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone)]
pub struct StartRequest {
    pub match_id: MatchId,
    pub home_team: TeamInfo,
    pub away_team: TeamInfo,
}

/// Handle to a running supervisor task
struct MatchHandle {
    stop_tx: watch::Sender<bool>,
    snapshot: Arc<RwLock<MatchSnapshot>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MatchHandle {
    fn signal_stop(&self) {
        // Receiver is gone once the match finished on its own
        let _ = self.stop_tx.send(true);
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().take()
    }
}

pub struct SimulationManager {
    config: Arc<SimulationConfig>,
    active: Arc<DashMap<MatchId, MatchHandle>>,
    /// Statistics dispatches of ended matches that may still be running
    aggregations: Arc<Mutex<Vec<JoinHandle<AggregationReport>>>>,
    broadcast: Arc<dyn MatchBroadcast>,
    roster: Arc<dyn RosterProvider>,
    aggregator: StatisticsAggregator,
    rng_factory: RngFactory,
}

impl SimulationManager {
    pub fn new(
        config: Arc<SimulationConfig>,
        broadcast: Arc<dyn MatchBroadcast>,
        roster: Arc<dyn RosterProvider>,
        aggregator: StatisticsAggregator,
    ) -> Self {
        Self {
            config,
            active: Arc::new(DashMap::new()),
            aggregations: Arc::new(Mutex::new(Vec::new())),
            broadcast,
            roster,
            aggregator,
            rng_factory: Arc::new(|match_id| {
                let seed = rand::random::<u64>();
                info!(match_id, seed, "Seeded match random source");
                Box::new(SeededRng::from_seed(seed)) as Box<dyn MatchRng>
            }),
        }
    }

    /// Replace the per-match random source
    pub fn with_rng_factory(mut self, rng_factory: RngFactory) -> Self {
        self.rng_factory = rng_factory;
        self
    }

    /// Start a simulation. Rejects ids that are already running.
    pub async fn start(&self, request: StartRequest) -> Result<MatchSnapshot, SimulationError> {
        let match_id = request.match_id;
        if self.active.contains_key(&match_id) {
            return Err(SimulationError::AlreadyRunning(match_id));
        }

        let mut home_team = request.home_team;
        if home_team.roster.is_none() {
            let roster = self
                .roster
                .home_roster(home_team.id)
                .await
                .map_err(|source| SimulationError::Roster {
                    team_id: home_team.id,
                    source,
                })?;
            home_team.roster = Some(roster);
        }

        let state = MatchSimulationState::new(match_id, home_team, request.away_team);
        let mut supervisor = MatchSupervisor::new(
            state,
            self.config.clone(),
            (self.rng_factory)(match_id),
            self.broadcast.clone(),
            self.aggregator.clone(),
        );
        let snapshot = supervisor.snapshot_handle();
        let (stop_tx, stop_rx) = watch::channel(false);

        // The slot stays locked until the handle carries its task, so stop and
        // shutdown always find something to wait on.
        match self.active.entry(match_id) {
            Entry::Occupied(_) => return Err(SimulationError::AlreadyRunning(match_id)),
            Entry::Vacant(slot) => {
                supervisor.begin();

                let active = self.active.clone();
                let aggregations = self.aggregations.clone();
                let task = tokio::spawn(async move {
                    let aggregation = supervisor.run(stop_rx).await;
                    if let Some(handle) = aggregation {
                        let mut pending = aggregations.lock();
                        pending.retain(|h| !h.is_finished());
                        pending.push(handle);
                    }
                    active.remove(&match_id);
                    info!(match_id, "Match removed from active set");
                });

                slot.insert(MatchHandle {
                    stop_tx,
                    snapshot: snapshot.clone(),
                    task: Mutex::new(Some(task)),
                });
            }
        }

        let view = snapshot.read().clone();
        Ok(view)
    }

    /// End a running match now and wait for its cleanup
    pub async fn stop(&self, match_id: MatchId) -> Result<(), SimulationError> {
        let task = {
            let handle = self
                .active
                .get(&match_id)
                .ok_or(SimulationError::NotRunning(match_id))?;
            handle.signal_stop();
            handle.take_task()
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(match_id, error = %e, "Supervisor task failed");
            }
        }
        Ok(())
    }

    /// Force every running match to end, wait for all supervisors, then give
    /// pending statistics submissions up to `stats_flush_timeout` to finish
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = self
            .active
            .iter()
            .filter_map(|entry| {
                entry.value().signal_stop();
                entry.value().take_task()
            })
            .collect();

        info!(matches = tasks.len(), "Shutting down running simulations");

        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Supervisor task failed during shutdown");
            }
        }

        self.flush_statistics().await;
    }

    async fn flush_statistics(&self) {
        let pending: Vec<JoinHandle<AggregationReport>> =
            std::mem::take(&mut *self.aggregations.lock());
        if pending.is_empty() {
            return;
        }

        let deadline = self.config.stats_flush_timeout;
        info!(pending = pending.len(), "Waiting for match statistics");

        match timeout(deadline, join_all(pending)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "Statistics task failed during shutdown");
                    }
                }
            }
            Err(_) => {
                warn!(
                    timeout_ms = deadline.as_millis() as u64,
                    "Statistics still pending at shutdown deadline"
                );
            }
        }
    }

    pub fn is_active(&self, match_id: MatchId) -> bool {
        self.active.contains_key(&match_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn snapshot(&self, match_id: MatchId) -> Option<MatchSnapshot> {
        self.active
            .get(&match_id)
            .map(|handle| handle.snapshot.read().clone())
    }

    pub fn snapshots(&self) -> Vec<MatchSnapshot> {
        let mut views: Vec<MatchSnapshot> = self
            .active
            .iter()
            .map(|entry| entry.value().snapshot.read().clone())
            .collect();
        views.sort_by_key(|v| v.match_id);
        views
    }
}
