//! # Core Application Logic
//!
//! This module contains Locally's business logic.
//! It knows nothing about any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Transcript, Session  │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//!     ┌────────────┐                          ┌────────────┐
//!     │    TUI     │                          │    API     │
//!     │  Adapter   │                          │  (reqwest) │
//!     │ (ratatui)  │                          │            │
//!     └────────────┘                          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transcript`]: folds stream events into the visible message list
//! - [`session`]: one request cycle at a time, with stale-event protection
//! - [`conversations`]: the cached sidebar listing and its backend calls
//! - [`health`]: the background liveness monitor
//! - [`config`]: `~/.locally/config.toml` and its override chain
//! - [`state`]: The `App` struct, all application state in one place
//! - [`action`]: The `Action` enum and `update()`

pub mod action;
pub mod config;
pub mod conversations;
pub mod health;
pub mod session;
pub mod state;
pub mod transcript;
