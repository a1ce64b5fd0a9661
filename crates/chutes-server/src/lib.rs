//! The game server: REST surface, push and pull transports, admin
//! inspection, and background retention sweeps, all over the shared
//! session core.

pub mod actions;
pub mod admin;
pub mod error;
pub mod handlers;
pub mod poll;
pub mod router;
pub mod server;
pub mod state;
pub mod sweeps;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
