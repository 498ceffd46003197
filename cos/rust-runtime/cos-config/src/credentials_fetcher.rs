/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Cache for credentials served by a remote credentials endpoint.
//!
//! [`CredentialsFetcher`] calls the endpoint only when it has to:
//! - on first use,
//! - once the credentials are within 15 minutes of their expiration,
//! - once an hour, for endpoints that do not report an expiration.
//!
//! Concurrent callers never trigger overlapping fetches. The first caller fetches while the
//! others wait for the lock and then see the fresh credentials.
//!
//! When a refresh fails, the cached credentials are served as long as they have not expired.
//! With [`allow_expired_credentials`](CredentialsFetcherBuilder::allow_expired_credentials)
//! expired credentials are served as well, and the next fetch is delayed by 50 to 70 seconds
//! so that an unavailable endpoint is not called on every request.

use crate::json_credentials::parse_json_credentials;
use cos_credential_types::provider::{self, future, CredentialsError, ProvideCredentials};
use cos_credential_types::Credentials;
use cos_smithy_async::time::{SharedTimeSource, TimeSource};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, trace_span, warn, Instrument};

const EXPIRATION_THRESHOLD: Duration = Duration::from_secs(15 * 60);
const REFRESH_THRESHOLD: Duration = Duration::from_secs(60 * 60);
const STALE_RETRY_MIN_DELAY: Duration = Duration::from_secs(50);
const STALE_RETRY_JITTER_MILLIS: u64 = 20_000;
const PROVIDER_NAME: &str = "CredentialsFetcher";

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Future returned by [`CredentialsEndpoint::credentials_response`].
pub type CredentialsResponse<'a> =
    Pin<Box<dyn Future<Output = Result<String, BoxError>> + Send + 'a>>;

/// A remote source of JSON credentials documents.
///
/// See [`json_credentials`](crate::json_credentials) for the document format.
pub trait CredentialsEndpoint: Send + Sync + fmt::Debug {
    /// Fetches the raw credentials document.
    fn credentials_response(&self) -> CredentialsResponse<'_>;
}

/// A [`CredentialsEndpoint`] implemented by a closure.
///
/// See [`credentials_endpoint_fn`].
#[derive(Copy, Clone)]
pub struct CredentialsEndpointFn<T> {
    f: T,
}

impl<T> fmt::Debug for CredentialsEndpointFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialsEndpointFn")
    }
}

impl<T, F> CredentialsEndpoint for CredentialsEndpointFn<T>
where
    T: Fn() -> F + Send + Sync,
    F: Future<Output = Result<String, BoxError>> + Send + 'static,
{
    fn credentials_response(&self) -> CredentialsResponse<'_> {
        Box::pin((self.f)())
    }
}

/// Creates a [`CredentialsEndpoint`] from a closure returning the raw document.
pub fn credentials_endpoint_fn<T, F>(f: T) -> CredentialsEndpointFn<T>
where
    T: Fn() -> F + Send + Sync,
    F: Future<Output = Result<String, BoxError>> + Send + 'static,
{
    CredentialsEndpointFn { f }
}

#[derive(Debug, Default)]
struct State {
    credentials: Option<Credentials>,
    expiration: Option<SystemTime>,
    refresh_time: Option<SystemTime>,
    last_check: Option<SystemTime>,
}

impl State {
    fn needs_refresh(&self, now: SystemTime) -> bool {
        if self.credentials.is_none() {
            return true;
        }
        if matches!(self.refresh_time, Some(refresh_time) if now >= refresh_time) {
            return true;
        }
        matches!(self.last_check, Some(last_check) if now >= last_check + REFRESH_THRESHOLD)
    }

    fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expiration, Some(expiration) if now >= expiration)
    }
}

#[derive(Debug)]
struct Inner {
    endpoint: Arc<dyn CredentialsEndpoint>,
    time_source: SharedTimeSource,
    allow_expired_credentials: bool,
    state: Mutex<State>,
}

impl Inner {
    async fn fetch(&self, state: &mut State) -> Result<(), CredentialsError> {
        let response = self
            .endpoint
            .credentials_response()
            .await
            .map_err(CredentialsError::provider_error)
            .and_then(|body| {
                parse_json_credentials(&body, PROVIDER_NAME).map_err(CredentialsError::from)
            });
        let now = self.time_source.now();
        state.last_check = Some(now);
        match response {
            Ok(credentials) => {
                self.store(state, credentials, now);
                Ok(())
            }
            Err(err) => self.handle_error(state, err, now),
        }
    }

    fn store(&self, state: &mut State, credentials: Credentials, now: SystemTime) {
        let expiration = credentials.expiry();
        state.expiration = expiration;
        state.refresh_time = expiration
            .map(|expiration| expiration.checked_sub(EXPIRATION_THRESHOLD).unwrap_or(expiration));
        state.credentials = Some(credentials);
        debug!(?expiration, refresh_time = ?state.refresh_time, "loaded credentials");

        // Credentials that arrive close to or past their expiration would otherwise be refetched
        // on every call.
        if self.allow_expired_credentials && state.needs_refresh(now) {
            self.schedule_stale_retry(state, now);
        }
    }

    fn handle_error(
        &self,
        state: &mut State,
        err: CredentialsError,
        now: SystemTime,
    ) -> Result<(), CredentialsError> {
        if state.credentials.is_none() {
            return Err(err);
        }
        if !self.allow_expired_credentials {
            if let Some(expiration) = state.expiration.filter(|_| state.is_expired(now)) {
                warn!(error = %err, "failed to refresh expired credentials");
                return Err(CredentialsError::expired(expiration));
            }
        }
        warn!(error = %err, "failed to refresh credentials; serving cached credentials");
        if self.allow_expired_credentials {
            self.schedule_stale_retry(state, now);
        }
        Ok(())
    }

    fn schedule_stale_retry(&self, state: &mut State, now: SystemTime) {
        let next_attempt = now
            + STALE_RETRY_MIN_DELAY
            + Duration::from_millis(fastrand::u64(0..=STALE_RETRY_JITTER_MILLIS));
        if matches!(state.expiration, Some(expiration) if next_attempt > expiration) {
            warn!(
                expiration = ?state.expiration,
                ?next_attempt,
                "credentials expire before the next refresh attempt"
            );
        }
        state.refresh_time = Some(next_attempt);
    }

    fn current(&self, state: &State) -> provider::Result {
        let credentials = state
            .credentials
            .clone()
            .ok_or_else(|| CredentialsError::not_loaded("no credentials have been fetched"))?;
        match state.expiration {
            Some(expiration)
                if !self.allow_expired_credentials
                    && state.is_expired(self.time_source.now()) =>
            {
                Err(CredentialsError::expired(expiration))
            }
            _ => Ok(credentials),
        }
    }
}

/// Caching credentials provider backed by a [`CredentialsEndpoint`].
///
/// Clones share the cache. Create one fetcher per endpoint and reuse it.
///
/// # Examples
///
/// ```no_run
/// use cos_config::credentials_fetcher::{credentials_endpoint_fn, CredentialsFetcher};
///
/// # async fn docs() {
/// let fetcher = CredentialsFetcher::builder(credentials_endpoint_fn(|| async {
///     // Call the credentials endpoint here.
///     Ok(r#"{"AccessKeyId": "akid", "SecretAccessKey": "secret"}"#.to_string())
/// }))
/// .allow_expired_credentials(true)
/// .build();
/// let credentials = fetcher.credentials().await;
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CredentialsFetcher {
    inner: Arc<Inner>,
}

impl CredentialsFetcher {
    /// Creates a fetcher for `endpoint` with default settings.
    pub fn new(endpoint: impl CredentialsEndpoint + 'static) -> Self {
        Self::builder(endpoint).build()
    }

    /// Creates a builder for a fetcher of `endpoint`.
    pub fn builder(endpoint: impl CredentialsEndpoint + 'static) -> CredentialsFetcherBuilder {
        CredentialsFetcherBuilder {
            endpoint: Arc::new(endpoint),
            time_source: None,
            allow_expired_credentials: false,
        }
    }

    /// Returns the cached credentials, fetching them first if they are due for a refresh.
    pub async fn credentials(&self) -> provider::Result {
        let mut state = self.inner.state.lock().await;
        if state.needs_refresh(self.inner.time_source.now()) {
            self.inner
                .fetch(&mut state)
                .instrument(trace_span!("fetch_credentials"))
                .await?;
        }
        self.inner.current(&state)
    }

    /// Drops the cached credentials and fetches new ones.
    ///
    /// Nothing is cached anymore when the fetch runs, so a failure is returned to the caller
    /// rather than masked by the previous credentials.
    pub async fn refresh(&self) -> provider::Result {
        let mut state = self.inner.state.lock().await;
        state.credentials = None;
        state.expiration = None;
        state.refresh_time = None;
        self.inner
            .fetch(&mut state)
            .instrument(trace_span!("fetch_credentials", forced = true))
            .await?;
        self.inner.current(&state)
    }

    /// True if expired credentials are served when a refresh fails.
    pub fn allow_expired_credentials(&self) -> bool {
        self.inner.allow_expired_credentials
    }
}

impl ProvideCredentials for CredentialsFetcher {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Builder for [`CredentialsFetcher`].
#[derive(Debug)]
pub struct CredentialsFetcherBuilder {
    endpoint: Arc<dyn CredentialsEndpoint>,
    time_source: Option<SharedTimeSource>,
    allow_expired_credentials: bool,
}

impl CredentialsFetcherBuilder {
    /// Sets the clock used to decide when credentials are refreshed. Defaults to the system clock.
    pub fn time_source(mut self, time_source: impl TimeSource + 'static) -> Self {
        self.time_source = Some(SharedTimeSource::new(time_source));
        self
    }

    /// Serve expired credentials when a refresh fails instead of returning an error.
    /// Defaults to `false`.
    pub fn allow_expired_credentials(mut self, allow_expired_credentials: bool) -> Self {
        self.allow_expired_credentials = allow_expired_credentials;
        self
    }

    /// Builds the fetcher. Nothing is fetched until credentials are first requested.
    pub fn build(self) -> CredentialsFetcher {
        CredentialsFetcher {
            inner: Arc::new(Inner {
                endpoint: self.endpoint,
                time_source: self.time_source.unwrap_or_default(),
                allow_expired_credentials: self.allow_expired_credentials,
                state: Mutex::new(State::default()),
            }),
        }
    }
}
