pub mod api_router;
pub mod appointments;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod backup;
pub mod core;
pub mod financial;
pub mod forms;
pub mod main_module;
pub mod patients;
pub mod payment_tables;
pub mod public;
pub mod security;
pub mod settings;
pub mod specialties;
pub mod stats;
pub mod users;
pub mod volunteers;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
pub use crate::main_module::{build_router, run_server, seed_admin};
