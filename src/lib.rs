// Library crate shared by the binary and the integration tests.

pub mod archive;
pub mod config;
pub mod error;
pub mod event_log;
pub mod prompt;
pub mod routes;
pub mod sampling;
pub mod server;
pub mod session;
pub mod simulation;
pub mod state;
pub mod wizard;
