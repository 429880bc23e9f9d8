//! # Registry Node
//!
//! The api-registry process: composition root, environment configuration
//! and the operator HTTP API over the registry cache.
//!
//! ## Module Structure
//!
//! ```text
//! registry-node/
//! ├── config.rs    # NodeConfig from environment variables
//! ├── routes.rs    # axum operator routes
//! ├── runtime.rs   # Adapter wiring and service lifecycle
//! └── main.rs      # Binary entry point
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod routes;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use routes::{build_router, ApiError, AppState};
pub use runtime::{NodePorts, NodeRuntime, RuntimeError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
