//! # Redline
//!
//! A collaborative text editing server. Owners and admins commit directly;
//! every other member proposes changes that a reviewer approves or rejects.
//! Connected clients share cursors, selections, and typing state over a
//! WebSocket. Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! redline = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use redline::config::ServerConfig;
//! use redline::identity::Directory;
//! use redline::server::{AppState, create_router};
//! use redline::types::Role;
//!
//! let directory = Directory::new();
//! directory.insert_user("ada", "Ada", Role::Admin);
//!
//! let state = Arc::new(AppState::new(Arc::new(directory), ServerConfig::default()));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod history;
pub mod identity;
pub mod presence;
pub mod server;
pub mod types;
pub mod workspace;
