use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::credential::Credential;
use crate::credential::TokenSnapshot;
use crate::error::AuthError;
use crate::oauth::OAuthConfig;
use crate::oauth::TokenEndpoint;
use crate::storage::persist_credential;
use crate::storage::try_read_auth_json;

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenSnapshot, AuthError>>>;

/// Externally visible lifecycle state of a managed credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authorizing,
    Authenticated,
    Refreshing,
    Expired,
    /// Static API key; never expires and never refreshes.
    ApiKey,
}

#[derive(Debug)]
enum Slot {
    Unauthenticated,
    Authorizing,
    Authenticated(Credential),
    Refreshing(Credential),
    Expired,
    ApiKey(String),
}

impl Slot {
    fn state(&self) -> AuthState {
        match self {
            Slot::Unauthenticated => AuthState::Unauthenticated,
            Slot::Authorizing => AuthState::Authorizing,
            Slot::Authenticated(_) => AuthState::Authenticated,
            Slot::Refreshing(_) => AuthState::Refreshing,
            Slot::Expired => AuthState::Expired,
            Slot::ApiKey(_) => AuthState::ApiKey,
        }
    }
}

struct Inner {
    slot: Slot,
    /// The single in-flight refresh, if any. Cleared by the refresh task
    /// itself once the new state has been recorded.
    in_flight: Option<RefreshFuture>,
    /// Bumped whenever a refresh starts or the identity changes (authorize,
    /// logout). A refresh task only commits its result while the generation
    /// it was started under is still current.
    generation: u64,
}

impl Inner {
    fn supersede_refresh(&mut self) {
        self.in_flight = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

enum Lookup {
    Ready(TokenSnapshot),
    Refresh,
}

/// Owns one credential identity and hands out [`TokenSnapshot`]s.
///
/// Refresh is single-flight: every caller that finds the token inside the
/// safety margin while a refresh is running awaits that same refresh and
/// observes the same snapshot or the same error. The refresh itself runs on
/// a spawned task, so dropping one waiting caller never cancels it.
pub struct CredentialManager {
    endpoint: TokenEndpoint,
    auth_file: Option<PathBuf>,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("issuer", &self.endpoint.config.issuer)
            .field("state", &self.state())
            .finish()
    }
}

impl CredentialManager {
    /// Unauthenticated manager for the given issuer/client identity.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_slot(config, Slot::Unauthenticated, None)
    }

    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        Self::with_slot(OAuthConfig::default(), Slot::ApiKey(api_key.into()), None)
    }

    /// Manager that starts out authenticated with `credential`.
    pub fn with_credential(config: OAuthConfig, credential: Credential) -> Self {
        Self::with_slot(config, Slot::Authenticated(credential), None)
    }

    /// Restores state from `auth_file`. A missing file yields an
    /// unauthenticated manager that will persist into that path once
    /// authorized.
    pub fn load(config: OAuthConfig, auth_file: &Path) -> Result<Self, AuthError> {
        let slot = match try_read_auth_json(auth_file) {
            Ok(auth) => match (auth.api_key.filter(|k| !k.trim().is_empty()), auth.tokens) {
                (Some(api_key), _) => Slot::ApiKey(api_key),
                (None, Some(credential)) => Slot::Authenticated(credential),
                (None, None) => Slot::Unauthenticated,
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %auth_file.display(), "no stored credentials");
                Slot::Unauthenticated
            }
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        Ok(Self::with_slot(config, slot, Some(auth_file.to_path_buf())))
    }

    /// Convenience constructor returning an `Arc` wrapper.
    pub fn shared(config: OAuthConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    fn with_slot(config: OAuthConfig, slot: Slot, auth_file: Option<PathBuf>) -> Self {
        Self {
            endpoint: TokenEndpoint::new(config),
            auth_file,
            inner: Arc::new(Mutex::new(Inner {
                slot,
                in_flight: None,
                generation: 0,
            })),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.endpoint.config
    }

    pub fn state(&self) -> AuthState {
        lock(&self.inner).slot.state()
    }

    /// Whether a 401 can be answered with a refresh.
    pub fn can_refresh(&self) -> bool {
        !matches!(lock(&self.inner).slot, Slot::ApiKey(_))
    }

    /// Exchanges an authorization code (plus its PKCE verifier) for tokens.
    /// On rejection the previous state is restored and
    /// [`AuthError::InvalidGrant`] is returned.
    pub async fn authorize(
        &self,
        pkce_verifier: &str,
        auth_code: &str,
    ) -> Result<Credential, AuthError> {
        let (previous, generation) = {
            let mut inner = lock(&self.inner);
            inner.supersede_refresh();
            let previous = std::mem::replace(&mut inner.slot, Slot::Authorizing);
            (previous, inner.generation)
        };

        match self.endpoint.exchange_code(pkce_verifier, auth_code).await {
            Ok(credential) => {
                let mut inner = lock(&self.inner);
                if inner.generation != generation {
                    debug!("authorization superseded by logout or a newer authorization");
                    return Err(AuthError::NotAuthenticated);
                }
                inner.slot = Slot::Authenticated(credential.clone());
                self.persist(&credential);
                drop(inner);
                info!(issuer = %credential.issuer, "authorization complete");
                Ok(credential)
            }
            Err(err) => {
                let mut inner = lock(&self.inner);
                if inner.generation == generation && matches!(inner.slot, Slot::Authorizing) {
                    // The refresh that may have been running was abandoned
                    // above; a later caller starts a new one.
                    inner.slot = match previous {
                        Slot::Refreshing(credential) => Slot::Authenticated(credential),
                        other => other,
                    };
                }
                warn!("authorization failed: {err}");
                Err(err)
            }
        }
    }

    /// Returns a snapshot that stays valid for at least the configured
    /// refresh margin, refreshing first if needed.
    pub async fn get_valid_token(&self) -> Result<TokenSnapshot, AuthError> {
        let refresh = {
            let mut inner = lock(&self.inner);
            let margin = self.endpoint.config.refresh_margin;
            let lookup = match &inner.slot {
                Slot::ApiKey(key) => Lookup::Ready(TokenSnapshot::api_key(key)),
                Slot::Authenticated(credential)
                    if !credential.expires_within(margin, Utc::now()) =>
                {
                    Lookup::Ready(credential.snapshot())
                }
                Slot::Authenticated(_) | Slot::Refreshing(_) => Lookup::Refresh,
                Slot::Unauthenticated | Slot::Authorizing => {
                    return Err(AuthError::NotAuthenticated);
                }
                Slot::Expired => return Err(expired_error()),
            };
            match lookup {
                Lookup::Ready(snapshot) => return Ok(snapshot),
                Lookup::Refresh => self.join_or_start_refresh(&mut inner)?,
            }
        };
        refresh.await
    }

    /// Refresh triggered by a 401 for `stale`. If another caller already
    /// replaced that token, the current snapshot is returned without a
    /// network call.
    pub async fn force_refresh(&self, stale: &TokenSnapshot) -> Result<TokenSnapshot, AuthError> {
        let refresh = {
            let mut inner = lock(&self.inner);
            let lookup = match &inner.slot {
                Slot::ApiKey(_) => return Err(AuthError::Unauthorized),
                Slot::Authenticated(credential)
                    if credential.access_token != stale.access_token =>
                {
                    Lookup::Ready(credential.snapshot())
                }
                Slot::Authenticated(_) | Slot::Refreshing(_) => Lookup::Refresh,
                Slot::Unauthenticated | Slot::Authorizing => {
                    return Err(AuthError::NotAuthenticated);
                }
                Slot::Expired => return Err(expired_error()),
            };
            match lookup {
                Lookup::Ready(snapshot) => return Ok(snapshot),
                Lookup::Refresh => self.join_or_start_refresh(&mut inner)?,
            }
        };
        refresh.await
    }

    /// Forgets the credential and removes the persisted file, if any.
    pub fn logout(&self) -> std::io::Result<bool> {
        {
            let mut inner = lock(&self.inner);
            inner.slot = Slot::Unauthenticated;
            inner.supersede_refresh();
        }
        match &self.auth_file {
            Some(path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(true),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(err) => Err(err),
            },
            None => Ok(false),
        }
    }

    /// Must be called with the lock held so that at most one refresh is ever
    /// started per identity.
    fn join_or_start_refresh(&self, inner: &mut Inner) -> Result<RefreshFuture, AuthError> {
        if let Some(in_flight) = &inner.in_flight {
            debug!("joining in-flight token refresh");
            return Ok(in_flight.clone());
        }

        let credential = match std::mem::replace(&mut inner.slot, Slot::Expired) {
            Slot::Authenticated(credential) | Slot::Refreshing(credential) => credential,
            other => {
                inner.slot = other;
                return Err(AuthError::NotAuthenticated);
            }
        };
        inner.slot = Slot::Refreshing(credential.clone());
        inner.supersede_refresh();
        let generation = inner.generation;

        let endpoint = self.endpoint.clone();
        let shared_inner = Arc::clone(&self.inner);
        let auth_file = self.auth_file.clone();
        // The task only takes the lock after this function returns and the
        // caller releases it, so `in_flight` is always set before it is
        // cleared.
        let task = tokio::spawn(async move {
            let result = endpoint.refresh(&credential).await;
            let mut inner = lock(&shared_inner);
            if inner.generation != generation || !matches!(inner.slot, Slot::Refreshing(_)) {
                debug!("discarding refresh superseded by logout or authorization");
                return Err(AuthError::NotAuthenticated);
            }
            inner.in_flight = None;
            match result {
                Ok(refreshed) => {
                    inner.slot = Slot::Authenticated(refreshed.clone());
                    // Persist before releasing the lock; a later logout
                    // then removes what was written here.
                    if let Some(path) = auth_file.as_deref() {
                        if let Err(err) = persist_credential(path, &refreshed) {
                            warn!("failed to persist refreshed credentials: {err}");
                        }
                    }
                    debug!(expires_at = %refreshed.expires_at, "token refreshed");
                    Ok(refreshed.snapshot())
                }
                Err(err) => {
                    inner.slot = Slot::Expired;
                    warn!("token refresh failed: {err}");
                    Err(err)
                }
            }
        });

        let refresh: RefreshFuture = async move {
            task.await
                .map_err(|err| AuthError::RefreshFailed(format!("refresh task failed: {err}")))?
        }
        .boxed()
        .shared();
        inner.in_flight = Some(refresh.clone());
        Ok(refresh)
    }

    fn persist(&self, credential: &Credential) {
        if let Some(path) = self.auth_file.as_deref() {
            if let Err(err) = persist_credential(path, credential) {
                warn!("failed to persist credentials: {err}");
            }
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn expired_error() -> AuthError {
    AuthError::RefreshFailed("credential expired; authorization is required".to_string())
}
