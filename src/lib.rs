// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Garmin Connect
//!
//! A client library and CLI for the Garmin Connect web API.
//!
//! ## Features
//!
//! - **SSO login**: OAuth1 request token, credential and MFA forms, then an
//!   OAuth1 to OAuth2 exchange, with cancellation at every step
//! - **Session handling**: JSON session file written atomically with owner-only
//!   permissions; expired bearer tokens are refreshed lazily
//! - **REST wrappers**: activities, profile, daily health data, body
//!   composition and gear
//! - **FIT container**: streaming encoder with the FIT CRC-16, plus a validator
//!
//! ## Architecture
//!
//! - **auth**: login state machine, OAuth1 signing, MFA prompting, sessions
//! - **client**: authenticated HTTP client with refresh-on-expiry
//! - **api**: typed endpoint wrappers on top of the client
//! - **fit**: FIT header, CRC and encoder
//! - **config**: TOML and environment configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use garmin_connect::auth::{Authenticator, ConsolePrompter, FileSessionStore};
//! use garmin_connect::client::GarminClient;
//! use garmin_connect::config::GarminConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GarminConfig::load(None)?;
//!     let store = FileSessionStore::new(config.session_path.clone());
//!
//!     let authenticator = Arc::new(
//!         Authenticator::new(config.clone())?
//!             .with_prompter(Arc::new(ConsolePrompter::new()))
//!             .with_store(store.clone()),
//!     );
//!     let outcome = authenticator
//!         .login("athlete@example.com", "password", &CancellationToken::new())
//!         .await?;
//!
//!     let client = GarminClient::new(&config, Some(outcome.session))?
//!         .with_refresher(authenticator)
//!         .with_store(store);
//!     let page = client.get_activities(0, 10).await?;
//!     println!("{} activities", page.activities.len());
//!
//!     Ok(())
//! }
//! ```

/// Typed Garmin Connect REST endpoints
pub mod api;

/// SSO login, OAuth1 signing, MFA and session persistence
pub mod auth;

/// Authenticated HTTP client
pub mod client;

/// Configuration management and persistence
pub mod config;

/// Service URLs, endpoint paths and defaults
pub mod constants;

/// Error taxonomy
pub mod error;

/// FIT container encoding and validation
pub mod fit;

/// Logging setup and structured events
pub mod logging;

pub use client::{GarminClient, RefreshSource};
pub use config::GarminConfig;
pub use error::{GarminError, Result};
