//! # fems
//!
//! Faculty event management: conflict-free room scheduling, lecturer access
//! control, and mirroring of agendas and users into an external calendar
//! and group directory. Usable both as a library and through the `fems`
//! operator binary.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! fems = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fems::actions::{AppState, create_agenda};
//! use fems::config::AppConfig;
//! use fems::store::{SqliteStore, Store};
//! use fems::sync::{GoogleCalendarClient, GoogleDirectoryClient};
//!
//! let config = AppConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let token = config.access_token().unwrap();
//! let state = AppState::new(
//!     Arc::new(store),
//!     Arc::new(GoogleCalendarClient::new(&config.calendar.api_base, &token)),
//!     Arc::new(GoogleDirectoryClient::new(&config.directory.api_base, &token)),
//!     &config,
//! )
//! .unwrap();
//! // create_agenda(&state, Some(&session), input).await
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `fems` binary. Disable with `default-features = false`.

pub mod actions;
pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod schedule;
pub mod store;
pub mod sync;
pub mod types;
