//! HTTP and gRPC transports for the Portal URL shortener.
//!
//! The binary in `main.rs` parses the [`cli::Cli`] and hands it to
//! [`server::run`]. Everything else is exposed so the router can be
//! exercised in tests without binding sockets.

pub mod app;
pub mod cli;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod server;
pub mod state;

pub use app::App;
pub use state::AppState;
