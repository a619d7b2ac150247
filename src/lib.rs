//! # Canopy
//!
//! Access-control and session core of a self-hosted git hosting server:
//! credential authentication, hierarchical space permissions and the
//! traffic router splitting requests into git, API and web lanes.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! canopy = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canopy::config::ServerConfig;
//! use canopy::server::{AppState, create_router};
//! use canopy::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(&config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `canopy` binary. Disable with `default-features = false`.

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod paths;
pub mod server;
pub mod store;
pub mod types;
