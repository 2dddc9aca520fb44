//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::simulation::{SimulationManager, StatisticsAggregator};
use crate::store::{
    InMemoryRoster, InMemoryStatsSink, RosterProvider, StatisticsSink, SupabaseClient,
    SupabaseRosterProvider, SupabaseStatsSink,
};
use crate::ws::{Broadcaster, SubscriptionRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub simulations: Arc<SimulationManager>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Pick collaborator stores
        let (roster, sink): (Arc<dyn RosterProvider>, Arc<dyn StatisticsSink>) =
            match &config.supabase {
                Some(supabase) => {
                    info!(url = %supabase.url, "Using Supabase roster and statistics stores");
                    let client = SupabaseClient::new(&supabase.url, &supabase.service_role_key);
                    (
                        Arc::new(SupabaseRosterProvider::new(client.clone())),
                        Arc::new(SupabaseStatsSink::new(client)),
                    )
                }
                None => {
                    info!("Supabase not configured, using in-memory stores");
                    (
                        Arc::new(InMemoryRoster::new()),
                        Arc::new(InMemoryStatsSink::new()),
                    )
                }
            };

        // Initialize fan-out
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(subscriptions.clone()));

        // Initialize simulation manager
        let simulations = Arc::new(SimulationManager::new(
            Arc::new(config.simulation.clone()),
            broadcaster.clone(),
            roster,
            StatisticsAggregator::new(sink),
        ));

        Self {
            config,
            subscriptions,
            broadcaster,
            simulations,
        }
    }
}
