//! Platform API module.
//!
//! This module provides:
//! - Per-task session headers and credentials
//! - HTTP client bound to one session
//! - The multi-step login flow and its browser fallback
//! - API response types and endpoint locations

pub mod auth;
pub mod browser;
pub mod client;
pub mod endpoints;
pub mod session;
pub mod types;

pub use auth::{authenticate, LoginFlowState, LoginOptions};
pub use client::XApi;
pub use session::{Credentials, Session};
pub use types::*;
