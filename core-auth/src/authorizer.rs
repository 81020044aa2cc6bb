//! # Authorizer
//!
//! Produces valid Drive credentials, in order of preference:
//!
//! 1. Stored credentials that are still valid
//! 2. Stored credentials refreshed with their refresh token
//! 3. A new interactive consent flow in the user's browser
//!
//! The consent flow is serialised process-wide: concurrent callers queue on
//! one lock and re-check the token file once they acquire it, so only the
//! first of them prompts the user.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::Authorizer;
//!
//! let authorizer = Authorizer::new(&config);
//! let credentials = authorizer.authorize().await?;
//! ```

use crate::client_secrets::ClientSecrets;
use crate::error::{AuthError, Result};
use crate::loopback::LoopbackListener;
use crate::oauth::{non_empty, OAuthConfig, OAuthFlowManager};
use crate::token_store::TokenStore;
use crate::types::{Credentials, DRIVE_SCOPE};
use bridge_traits::{Clock, HttpClient, RetryPolicy};
use core_async::sync::{CancellationToken, Mutex};
use core_async::time::timeout;
use core_runtime::config::CoreConfig;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

fn consent_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Shows the authorization URL to the user.
pub trait ConsentPresenter: Send + Sync {
    fn present(&self, authorization_url: &str);
}

/// Prints the URL and, when enabled, opens it in the system browser.
#[derive(Debug, Clone, Copy)]
pub struct BrowserPresenter {
    pub open_browser: bool,
}

impl ConsentPresenter for BrowserPresenter {
    fn present(&self, authorization_url: &str) {
        eprintln!(
            "Please visit this URL to authorize this application: {}",
            authorization_url
        );

        if self.open_browser {
            if let Err(e) = open::that(authorization_url) {
                warn!(error = %e, "Could not launch a browser; open the URL manually");
            }
        }
    }
}

/// Settings the authorizer reads from [`CoreConfig`].
#[derive(Debug, Clone)]
pub struct AuthorizerSettings {
    pub client_secrets_path: Option<PathBuf>,
    pub consent_timeout: Duration,
    pub loopback_port: u16,
    pub expiry_buffer: Duration,
    pub retry_policy: RetryPolicy,
}

impl AuthorizerSettings {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            client_secrets_path: config.client_secrets_path.clone(),
            consent_timeout: config.consent_timeout,
            loopback_port: config.loopback_port,
            expiry_buffer: config.token_expiry_buffer,
            retry_policy: config.retry_policy.clone(),
        }
    }
}

/// Loads, refreshes or obtains Drive credentials.
pub struct Authorizer {
    store: TokenStore,
    settings: AuthorizerSettings,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    presenter: Arc<dyn ConsentPresenter>,
    cancel: CancellationToken,
}

impl Authorizer {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            store: TokenStore::new(config.token_path.clone()),
            settings: AuthorizerSettings::from_config(config),
            http_client: Arc::clone(&config.http_client),
            clock: Arc::clone(&config.clock),
            presenter: Arc::new(BrowserPresenter {
                open_browser: config.open_browser,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace how the authorization URL is shown to the user.
    pub fn with_presenter(mut self, presenter: Arc<dyn ConsentPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Use a caller-owned token to cancel a pending consent flow.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts a pending consent flow when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Return valid credentials, refreshing or prompting as needed.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenRefreshFailed`] when a stored refresh token is rejected
    /// - [`AuthError::MissingClientSecrets`] when consent is needed but no
    ///   client-secret file is configured
    /// - [`AuthError::ConsentTimedOut`], [`AuthError::ConsentCancelled`] and
    ///   [`AuthError::ConsentDenied`] from the interactive flow
    #[instrument(skip(self), fields(token_path = %self.store.path().display()))]
    pub async fn authorize(&self) -> Result<Credentials> {
        if let Some(credentials) = self.stored_or_refreshed().await? {
            return Ok(credentials);
        }

        let _guard = consent_lock().lock().await;

        // Another caller may have finished consent while this one waited.
        if let Some(credentials) = self.stored_or_refreshed().await? {
            return Ok(credentials);
        }

        let credentials = self.run_consent_flow().await?;
        self.store.save(&credentials).await?;
        Ok(credentials)
    }

    /// Delete stored credentials so the next `authorize` prompts again.
    pub async fn revoke_local(&self) -> Result<bool> {
        self.store.delete().await
    }

    async fn stored_or_refreshed(&self) -> Result<Option<Credentials>> {
        let Some(stored) = self.store.load().await? else {
            return Ok(None);
        };

        if !stored.has_scope(DRIVE_SCOPE) {
            info!("Stored credentials do not grant Drive access; consent is required");
            return Ok(None);
        }

        let now = self.clock.now();
        let buffer = Credentials::buffer_from(self.settings.expiry_buffer);

        if stored.is_valid(now, buffer) {
            debug!("Using stored credentials");
            return Ok(Some(stored));
        }

        if !stored.can_refresh() {
            info!("Stored credentials expired without a refresh token; consent is required");
            return Ok(None);
        }

        let refreshed = self.refresh(&stored).await?;
        self.store.save(&refreshed).await?;
        Ok(Some(refreshed))
    }

    async fn refresh(&self, stored: &Credentials) -> Result<Credentials> {
        let refresh_token = stored.refresh_token.as_deref().unwrap_or_default();

        let manager = OAuthFlowManager::new(
            OAuthConfig {
                client_id: stored.client_id.clone(),
                client_secret: non_empty(&stored.client_secret),
                redirect_uri: String::new(),
                scopes: stored.scopes.clone(),
                auth_url: String::new(),
                token_url: stored.token_uri.clone(),
            },
            Arc::clone(&self.http_client),
            self.settings.retry_policy.clone(),
        );

        let grant = manager.refresh_access_token(refresh_token).await?;
        let now = self.clock.now();

        Ok(Credentials {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token.or_else(|| stored.refresh_token.clone()),
            expiry: Some(now + chrono::Duration::seconds(grant.expires_in)),
            scopes: if grant.scopes.is_empty() {
                stored.scopes.clone()
            } else {
                grant.scopes
            },
            ..stored.clone()
        })
    }

    async fn run_consent_flow(&self) -> Result<Credentials> {
        let secrets_path = self
            .settings
            .client_secrets_path
            .as_deref()
            .ok_or(AuthError::MissingClientSecrets)?;
        let secrets = ClientSecrets::load(secrets_path).await?;

        let listener = LoopbackListener::bind(self.settings.loopback_port).await?;
        let manager = OAuthFlowManager::new(
            OAuthConfig::from_client_secrets(
                &secrets,
                listener.redirect_uri(),
                vec![DRIVE_SCOPE.to_string()],
            ),
            Arc::clone(&self.http_client),
            self.settings.retry_policy.clone(),
        );

        let (authorization_url, verifier) = manager.build_auth_url()?;
        info!(port = listener.port(), "Waiting for the user to grant access");
        self.presenter.present(&authorization_url);

        let consent_timeout = self.settings.consent_timeout;
        let callback = core_async::select! {
            _ = self.cancel.cancelled() => {
                warn!("Consent flow cancelled");
                return Err(AuthError::ConsentCancelled);
            }
            outcome = timeout(consent_timeout, listener.accept_callback()) => match outcome {
                Ok(callback) => callback?,
                Err(_) => {
                    warn!(timeout_secs = consent_timeout.as_secs(), "Consent flow timed out");
                    return Err(AuthError::ConsentTimedOut(consent_timeout));
                }
            }
        };

        if let Some(error) = callback.error {
            warn!(error = %error, "User did not grant access");
            return Err(AuthError::ConsentDenied(error));
        }

        let code = callback
            .code
            .ok_or_else(|| AuthError::InvalidCallback("Redirect carried no code".to_string()))?;
        let state = callback.state.unwrap_or_default();

        let grant = manager.exchange_code(&code, &state, &verifier).await?;
        let now = self.clock.now();

        Ok(Credentials {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: if grant.scopes.is_empty() {
                vec![DRIVE_SCOPE.to_string()]
            } else {
                grant.scopes
            },
            expiry: Some(now + chrono::Duration::seconds(grant.expires_in)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TOKEN_URI;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{FixedClock, HttpMethod, HttpRequest, HttpResponse};
    use chrono::{TimeZone, Utc};
    use core_async::io::{AsyncReadExt, AsyncWriteExt};
    use core_async::net::TcpStream;
    use mockall::mock;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    mock! {
        Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    const CLIENT_SECRETS: &str = r#"{"installed": {
        "client_id": "desktop-client",
        "client_secret": "desktop-secret",
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token",
        "redirect_uris": ["http://localhost"]
    }}"#;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn config(dir: &Path, http: MockHttp, with_secrets: bool) -> CoreConfig {
        let mut builder = CoreConfig::builder()
            .token_path(dir.join("token.json"))
            .http_client(Arc::new(http))
            .clock(Arc::new(FixedClock(now())))
            .open_browser(false)
            .consent_timeout(Duration::from_secs(5));

        if with_secrets {
            let path = dir.join("credentials.json");
            std::fs::write(&path, CLIENT_SECRETS).unwrap();
            builder = builder.client_secrets_path(path);
        }

        builder.build().unwrap()
    }

    fn stored(expiry: chrono::DateTime<Utc>, refresh: Option<&str>) -> Credentials {
        Credentials {
            access_token: Some("stored-access".to_string()),
            refresh_token: refresh.map(str::to_string),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "desktop-client".to_string(),
            client_secret: "desktop-secret".to_string(),
            scopes: vec![DRIVE_SCOPE.to_string()],
            expiry: Some(expiry),
        }
    }

    fn write_token(dir: &Path, credentials: &Credentials) {
        std::fs::write(
            dir.join("token.json"),
            serde_json::to_vec(credentials).unwrap(),
        )
        .unwrap();
    }

    /// Plays the user's browser: follows the authorization URL's redirect
    /// with a code (or an error) and the issued state.
    struct FakeBrowser {
        outcome: &'static str,
        seen_url: StdMutex<Option<String>>,
    }

    impl FakeBrowser {
        fn approving() -> Arc<Self> {
            Arc::new(Self {
                outcome: "code=4%2Fauth-code",
                seen_url: StdMutex::new(None),
            })
        }

        fn denying() -> Arc<Self> {
            Arc::new(Self {
                outcome: "error=access_denied",
                seen_url: StdMutex::new(None),
            })
        }
    }

    impl ConsentPresenter for FakeBrowser {
        fn present(&self, authorization_url: &str) {
            *self.seen_url.lock().unwrap() = Some(authorization_url.to_string());

            let url = url::Url::parse(authorization_url).unwrap();
            let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
            let redirect = url::Url::parse(&pairs["redirect_uri"]).unwrap();
            let port = redirect.port().unwrap();
            let target = format!("/?{}&state={}", self.outcome, pairs["state"]);

            core_async::spawn(async move {
                let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
                let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut response = String::new();
                let _ = stream.read_to_string(&mut response).await;
            });
        }
    }

    /// Never completes the redirect.
    struct IdleUser;

    impl ConsentPresenter for IdleUser {
        fn present(&self, _authorization_url: &str) {}
    }

    #[core_async::test]
    async fn test_valid_stored_credentials_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = stored(now() + chrono::Duration::hours(1), Some("1//r"));
        write_token(dir.path(), &credentials);

        let mut http = MockHttp::new();
        http.expect_execute().never();

        let authorizer = Authorizer::new(&config(dir.path(), http, false));
        assert_eq!(authorizer.authorize().await.unwrap(), credentials);
    }

    #[core_async::test]
    async fn test_expired_credentials_are_refreshed_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        write_token(dir.path(), &stored(now() - chrono::Duration::hours(1), Some("1//keep")));

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.method == HttpMethod::Post && request.url == DEFAULT_TOKEN_URI)
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token":"fresh-access","expires_in":3600}"#,
                ))
            });

        let authorizer = Authorizer::new(&config(dir.path(), http, false));
        let credentials = authorizer.authorize().await.unwrap();

        assert_eq!(credentials.access_token(), Some("fresh-access"));
        assert_eq!(credentials.refresh_token.as_deref(), Some("1//keep"));
        assert_eq!(credentials.expiry, Some(now() + chrono::Duration::hours(1)));

        let persisted = authorizer.token_store().load().await.unwrap().unwrap();
        assert_eq!(persisted, credentials);
    }

    #[core_async::test]
    async fn test_rejected_refresh_propagates() {
        let dir = tempfile::tempdir().unwrap();
        write_token(dir.path(), &stored(now() - chrono::Duration::hours(1), Some("1//revoked")));

        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(400, r#"{"error":"invalid_grant"}"#)));

        let authorizer = Authorizer::new(&config(dir.path(), http, true));
        let err = authorizer.authorize().await.unwrap_err();

        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
    }

    #[core_async::test]
    async fn test_missing_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let authorizer = Authorizer::new(&config(dir.path(), http, false));
        let err = authorizer.authorize().await.unwrap_err();

        assert!(matches!(err, AuthError::MissingClientSecrets));
    }

    #[core_async::test]
    async fn test_consent_flow_exchanges_code_and_persists() {
        let dir = tempfile::tempdir().unwrap();

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                let body = String::from_utf8(request.body.clone().unwrap_or_default().to_vec())
                    .unwrap();
                body.contains("grant_type=authorization_code")
                    && body.contains("code=4%2Fauth-code")
                    && body.contains("client_id=desktop-client")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token":"new-access","refresh_token":"1//new","expires_in":3599}"#,
                ))
            });

        let browser = FakeBrowser::approving();
        let authorizer = Authorizer::new(&config(dir.path(), http, true))
            .with_presenter(browser.clone());

        let credentials = authorizer.authorize().await.unwrap();

        assert_eq!(credentials.access_token(), Some("new-access"));
        assert_eq!(credentials.refresh_token.as_deref(), Some("1//new"));
        assert_eq!(credentials.client_id, "desktop-client");
        assert!(credentials.has_scope(DRIVE_SCOPE));

        let seen = browser.seen_url.lock().unwrap().clone().unwrap();
        assert!(seen.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(seen.contains("prompt=consent"));

        let persisted = authorizer.token_store().load().await.unwrap().unwrap();
        assert_eq!(persisted, credentials);
    }

    #[core_async::test]
    async fn test_scope_mismatch_triggers_consent() {
        let dir = tempfile::tempdir().unwrap();
        let mut readonly = stored(now() + chrono::Duration::hours(1), Some("1//r"));
        readonly.scopes = vec!["https://www.googleapis.com/auth/drive.readonly".to_string()];
        write_token(dir.path(), &readonly);

        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"full-access"}"#)));

        let authorizer = Authorizer::new(&config(dir.path(), http, true))
            .with_presenter(FakeBrowser::approving());

        let credentials = authorizer.authorize().await.unwrap();
        assert_eq!(credentials.access_token(), Some("full-access"));
        assert_eq!(credentials.scopes, vec![DRIVE_SCOPE.to_string()]);
    }

    #[core_async::test]
    async fn test_consent_denied() {
        let dir = tempfile::tempdir().unwrap();
        let mut http = MockHttp::new();
        http.expect_execute().never();

        let authorizer = Authorizer::new(&config(dir.path(), http, true))
            .with_presenter(FakeBrowser::denying());

        let err = authorizer.authorize().await.unwrap_err();
        match err {
            AuthError::ConsentDenied(reason) => assert_eq!(reason, "access_denied"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(authorizer.token_store().load().await.unwrap().is_none());
    }

    #[core_async::test]
    async fn test_consent_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), MockHttp::new(), true);
        cfg.consent_timeout = Duration::from_millis(50);

        let authorizer = Authorizer::new(&cfg).with_presenter(Arc::new(IdleUser));
        let err = authorizer.authorize().await.unwrap_err();

        assert!(matches!(err, AuthError::ConsentTimedOut(_)));
    }

    #[core_async::test]
    async fn test_consent_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let authorizer = Authorizer::new(&config(dir.path(), MockHttp::new(), true))
            .with_presenter(Arc::new(IdleUser))
            .with_cancellation(token.clone());

        token.cancel();
        let err = authorizer.authorize().await.unwrap_err();

        assert!(matches!(err, AuthError::ConsentCancelled));
    }

    #[core_async::test]
    async fn test_revoke_local() {
        let dir = tempfile::tempdir().unwrap();
        write_token(dir.path(), &stored(now() + chrono::Duration::hours(1), None));

        let authorizer = Authorizer::new(&config(dir.path(), MockHttp::new(), false));

        assert!(authorizer.revoke_local().await.unwrap());
        assert!(!authorizer.revoke_local().await.unwrap());
        assert!(authorizer.token_store().load().await.unwrap().is_none());
    }
}
