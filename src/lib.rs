//! A smoke test for the Earth Engine REST API.
//!
//! The check authenticates with OAuth2 refresh-token credentials, echoes a
//! string through `value:compute`, then samples the SRTM elevation model at
//! the summit of Mount Everest and asserts the value is positive.
//!
//! ## Quick start
//! - Store credentials at `~/.config/earthengine/credentials`, or put the same
//!   JSON object in `EARTHENGINE_TOKEN` and pick a [`CredentialMode`].
//! - Build a [`Session`] and run a [`SmokeTest`].
//!
//! ```no_run
//! use anyhow::Result;
//! use eesmoke::{Session, SmokeTest};
//!
//! fn main() -> Result<()> {
//!     let session = Session::from_env()?;
//!     let report = SmokeTest::default().run(&session)?;
//!     println!("{}", report.greeting);
//!     println!("Mount Everest elevation (m): {}", report.elevation);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod auth;
mod client;
mod config;
mod credentials;
mod error;
mod expression;
mod logging;
mod smoke;
mod util;

pub use client::{ClientConfig, Session};
pub use config::{DEFAULT_API_URL, credentials_path, load_config};
pub use credentials::{
    CredentialMode, CredentialRecord, DEFAULT_SCOPES, DEFAULT_TOKEN_URI, OAuth2Credentials,
    TOKEN_ENV, acquire, acquire_with, default_credentials_path, persist_credentials,
};
pub use expression::{Expr, Expression, LonLat};
pub use logging::init_logger;
pub use smoke::{EVEREST, GREETING, SRTM_DATASET, SmokeReport, SmokeTest, verify_elevation};
