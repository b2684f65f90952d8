//! Google Calendar store.
//!
//! [`GoogleStore`] reaches the Google Calendar API v3 on behalf of the user.
//!
//! # Authorization
//!
//! 1. The user registers their own OAuth desktop client (Google requires it)
//! 2. `calsweep auth google` binds a loopback port and opens the consent page
//! 3. The redirect delivers an authorization code, exchanged with the PKCE verifier
//! 4. Access and refresh tokens are written to a file only the user can read
//!
//! Later runs reuse the tokens and refresh the access token when it expires.
//!
//! # Example
//!
//! ```ignore
//! use calsweep_providers::google::{GoogleConfig, GoogleStore, OAuthCredentials};
//!
//! let store = GoogleStore::new(GoogleConfig::new(OAuthCredentials::new(id, secret)))?;
//! if store.needs_reauth() {
//!     store.authenticate().await?;
//! }
//! ```

mod client;
mod config;
mod oauth;
mod store;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{CredentialsError, GoogleConfig, OAuthCredentials};
pub use oauth::{OAuthClient, PkceFlow};
pub use store::GoogleStore;
pub use tokens::{TokenInfo, TokenStorage};
