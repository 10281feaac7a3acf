//! HTTP control surface for the harvester orchestrator.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
