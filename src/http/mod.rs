//! HTTP surface: health, match queries and WebSocket upgrade

pub mod routes;

pub use routes::build_router;
