//! Collaborator stores: rosters and statistics, backed by Supabase or memory

pub mod roster;
pub mod statistics;
pub mod supabase;

pub use roster::{InMemoryRoster, RosterProvider, SupabaseRosterProvider};
pub use statistics::{InMemoryStatsSink, StatisticsSink, StatsDelta, SupabaseStatsSink};
pub use supabase::{StoreError, SupabaseClient};
