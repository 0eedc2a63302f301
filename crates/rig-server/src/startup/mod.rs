//! Application startup utilities module.
//!
//! Logging setup, HTTP endpoints and process lifecycle shared by the
//! rig-server binary and embedders of the library.

mod http;
mod logging;
mod shutdown;

pub use http::{health_routes, health_server, metrics_routes, metrics_server, serve_until_shutdown};
pub use logging::{LogFormat, LoggingConfig, init_logging};
pub use shutdown::{ServiceGroup, ShutdownSignal, wait_for_shutdown_signal, watch_signals};
