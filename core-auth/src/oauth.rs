//! OAuth 2.0 Authorization Flow Manager with PKCE Support
//!
//! This module implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) for the
//! installed-application flow against Google's endpoints.
//!
//! # Overview
//!
//! The OAuth flow manager handles:
//! - Building authorization URLs with PKCE challenge
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens
//! - State verification for CSRF protection
//!
//! # Security
//!
//! - Generates cryptographically secure random state and code verifier
//! - Validates state parameter to prevent CSRF attacks
//! - Never logs sensitive values (tokens, codes, verifiers)
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use bridge_traits::RetryPolicy;
//! use std::sync::Arc;
//!
//! # fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig {
//!     client_id: "your-client-id".to_string(),
//!     client_secret: Some("your-client-secret".to_string()),
//!     redirect_uri: "http://localhost:8080/".to_string(),
//!     scopes: vec![core_auth::DRIVE_SCOPE.to_string()],
//!     auth_url: core_auth::DEFAULT_AUTH_URI.to_string(),
//!     token_url: core_auth::DEFAULT_TOKEN_URI.to_string(),
//! };
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client, RetryPolicy::none());
//! let (auth_url, pkce_verifier) = flow_manager.build_auth_url()?;
//! // Send the user to auth_url...
//! # Ok(())
//! # }
//! ```

use crate::client_secrets::ClientSecrets;
use crate::error::{AuthError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// OAuth 2.0 client configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    /// Redirect URI for the OAuth callback
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration for a consent flow driven by a client-secret file.
    pub fn from_client_secrets(
        secrets: &ClientSecrets,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: secrets.client_id.clone(),
            client_secret: non_empty(&secrets.client_secret),
            redirect_uri: redirect_uri.into(),
            scopes,
            auth_url: secrets.auth_uri.clone(),
            token_url: secrets.token_uri.clone(),
        }
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// The verifier stays local; only the challenge derived from it is sent
/// with the authorization request.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    /// The code verifier (base64-url-encoded random string)
    verifier: String,
    /// The state parameter for CSRF protection
    state: String,
}

impl PkceVerifier {
    /// Create a new PKCE verifier with cryptographically secure random values.
    ///
    /// Generates a 32-byte code verifier and a 16-byte state, both encoded
    /// as URL-safe base64 without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        // 43 characters once encoded (RFC 7636 allows 43-128)
        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Compute the code challenge from the verifier.
    ///
    /// Uses S256 method: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        let hash = hasher.finalize();
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokens granted by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    /// Scopes actually granted; empty when the server did not say
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// OAuth 2.0 flow manager.
///
/// Handles the authorization code flow with PKCE and refresh-token grants.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    retry_policy: RetryPolicy,
}

impl OAuthFlowManager {
    pub fn new(
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            config,
            http_client,
            retry_policy,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL with PKCE challenge.
    ///
    /// Returns both the URL and the PKCE verifier, which must be kept for
    /// [`exchange_code`](Self::exchange_code).
    ///
    /// The URL always asks for offline access and forces the consent screen
    /// so that Google issues a refresh token on every run.
    #[instrument(skip(self), fields(client_id = %self.config.client_id))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", verifier.state());
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline");
            query.append_pair("prompt", "consent");
        }

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StateMismatch`] when `state` is not the one issued
    /// - [`AuthError::InvalidAuthCode`] when the token endpoint rejects the code
    /// - [`AuthError::NetworkError`] when no response was received
    #[instrument(skip(self, code, state, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<TokenGrant> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on consent redirect");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        if let Some(client_secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", client_secret));
        }

        debug!("Exchanging authorization code for tokens");

        let response = self.post_token_request(&params).await?;

        if !response.is_success() {
            let error_body = error_text(&response);
            warn!(
                status = response.status,
                error = %error_body,
                "Token exchange failed while exchanging authorization code"
            );
            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                response.status, error_body
            )));
        }

        let grant = parse_grant(&response)?;
        info!(
            expires_in = grant.expires_in,
            has_refresh_token = grant.refresh_token.is_some(),
            "Exchanged authorization code for tokens"
        );
        Ok(grant)
    }

    /// Refresh an access token using a refresh token.
    ///
    /// When the server does not rotate the refresh token, the one passed in
    /// is carried over into the returned grant.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(client_secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", client_secret));
        }

        debug!("Refreshing access token");

        let response = self.post_token_request(&params).await?;

        if !response.is_success() {
            let error_body = error_text(&response);
            warn!(
                status = response.status,
                error = %error_body,
                "Token refresh failed"
            );
            return Err(AuthError::TokenRefreshFailed(format!(
                "Token endpoint returned {}: {}",
                response.status, error_body
            )));
        }

        let mut grant = parse_grant(&response)?;
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_string());
        }

        info!(expires_in = grant.expires_in, "Refreshed access token");
        Ok(grant)
    }

    async fn post_token_request(&self, params: &[(&str, &str)]) -> Result<HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .form(&params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        self.http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))
    }
}

fn error_text(response: &HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

fn parse_grant(response: &HttpResponse) -> Result<TokenGrant> {
    let token_response: TokenResponse = response
        .json()
        .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

    Ok(TokenGrant {
        access_token: token_response.access_token,
        refresh_token: token_response.refresh_token,
        expires_in: token_response.expires_in,
        scopes: token_response
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600 // Default to 1 hour if not specified
}
