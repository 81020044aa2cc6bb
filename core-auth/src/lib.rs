//! # Authentication Module
//!
//! Credential handling for the Drive service.
//!
//! ## Overview
//!
//! Credentials live in a single JSON file in Google's authorized-user
//! layout. [`Authorizer`] reuses them while valid, refreshes them when they
//! expire and otherwise runs the installed-application consent flow: a
//! browser is sent to Google's consent screen and the redirect is caught on
//! a loopback listener.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flow with PKCE (S256)
//! - Refresh-token grants, keeping the old refresh token when not rotated
//! - One consent flow per process at a time, bounded by a timeout and
//!   cancellable through a `CancellationToken`
//! - Token values redacted from `Debug` output and logs

pub mod authorizer;
pub mod client_secrets;
pub mod error;
pub mod loopback;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use authorizer::{Authorizer, AuthorizerSettings, BrowserPresenter, ConsentPresenter};
pub use client_secrets::ClientSecrets;
pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier, TokenGrant};
pub use token_store::TokenStore;
pub use types::{Credentials, DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI, DRIVE_SCOPE};
