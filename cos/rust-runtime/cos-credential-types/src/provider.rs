/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Credentials provider abstraction and its error type.

use crate::Credentials;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Error returned when credentials failed to load.
#[derive(Debug)]
#[non_exhaustive]
pub enum CredentialsError {
    /// No credentials were available for this provider
    CredentialsNotLoaded(BoxError),

    /// Loading credentials from this provider exceeded the maximum allowed duration
    ProviderTimedOut(Duration),

    /// The provider was given an invalid configuration
    InvalidConfiguration(BoxError),

    /// The provider experienced an error during credential resolution
    ///
    /// This may include errors like a 503 from the credentials endpoint or an error document
    /// returned in place of credentials.
    ProviderError(BoxError),

    /// The cached credentials expired and the provider does not allow serving expired credentials
    Expired {
        /// When the credentials expired
        expiration: SystemTime,
    },

    /// An unexpected error occurred during credential resolution
    ///
    /// If the error is something that can occur during expected usage of a provider, `ProviderError`
    /// should be returned instead. Unhandled is reserved for exceptional cases, for example:
    /// - Returned data not UTF-8
    /// - A provider returns data that is missing required fields
    Unhandled(BoxError),
}

impl CredentialsError {
    /// The credentials provider did not provide credentials
    pub fn not_loaded(source: impl Into<BoxError>) -> Self {
        CredentialsError::CredentialsNotLoaded(source.into())
    }

    /// An unexpected error occurred loading credentials from this provider
    pub fn unhandled(source: impl Into<BoxError>) -> Self {
        CredentialsError::Unhandled(source.into())
    }

    /// The credentials provider returned an error
    pub fn provider_error(source: impl Into<BoxError>) -> Self {
        CredentialsError::ProviderError(source.into())
    }

    /// The provided configuration for a provider was invalid
    pub fn invalid_configuration(source: impl Into<BoxError>) -> Self {
        CredentialsError::InvalidConfiguration(source.into())
    }

    /// The credentials expired and serving expired credentials is not allowed
    pub fn expired(expiration: SystemTime) -> Self {
        CredentialsError::Expired { expiration }
    }

    /// The credentials provider did not provide credentials within an allotted duration
    pub fn provider_timed_out(timeout_duration: Duration) -> Self {
        CredentialsError::ProviderTimedOut(timeout_duration)
    }

    /// True for the "credentials expired" category
    pub fn is_expired(&self) -> bool {
        matches!(self, CredentialsError::Expired { .. })
    }
}

impl Display for CredentialsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::CredentialsNotLoaded(_) => {
                write!(f, "the credential provider was not enabled")
            }
            CredentialsError::ProviderTimedOut(d) => write!(
                f,
                "credentials provider timed out after {} seconds",
                d.as_secs()
            ),
            CredentialsError::InvalidConfiguration(_) => {
                write!(f, "the credentials provider was not properly configured")
            }
            CredentialsError::ProviderError(_) => {
                write!(f, "an error occurred while loading credentials")
            }
            CredentialsError::Expired { expiration } => {
                let secs = expiration
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default();
                write!(f, "credentials expired (expiration: {secs} seconds since epoch)")
            }
            CredentialsError::Unhandled(_) => {
                write!(f, "unexpected credentials error")
            }
        }
    }
}

impl Error for CredentialsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialsError::CredentialsNotLoaded(e)
            | CredentialsError::InvalidConfiguration(e)
            | CredentialsError::ProviderError(e)
            | CredentialsError::Unhandled(e) => Some(e.as_ref() as _),
            CredentialsError::ProviderTimedOut(_) | CredentialsError::Expired { .. } => None,
        }
    }
}

/// Result type for credential providers.
pub type Result = std::result::Result<Credentials, CredentialsError>;

/// Convenience `ProvideCredentials` struct that implements the `ProvideCredentials` trait.
pub mod future {
    use cos_smithy_async::future::now_or_later::{BoxFuture, NowOrLater};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Future new-type that `ProvideCredentials::provide_credentials` must return.
    pub struct ProvideCredentials<'a>(NowOrLater<super::Result, BoxFuture<'a, super::Result>>);

    impl<'a> ProvideCredentials<'a> {
        /// Creates a `ProvideCredentials` struct from a future.
        pub fn new(future: impl Future<Output = super::Result> + Send + 'a) -> Self {
            ProvideCredentials(NowOrLater::new(Box::pin(future)))
        }

        /// Creates a `ProvideCredentials` struct from a resolved credentials value.
        pub fn ready(credentials: super::Result) -> Self {
            ProvideCredentials(NowOrLater::ready(credentials))
        }
    }

    impl fmt::Debug for ProvideCredentials<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("ProvideCredentials").finish()
        }
    }

    impl Future for ProvideCredentials<'_> {
        type Output = super::Result;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            Pin::new(&mut self.0).poll(cx)
        }
    }
}

/// Asynchronous Credentials Provider
pub trait ProvideCredentials: Send + Sync + Debug {
    /// Returns a future that provides credentials.
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a;
}

impl ProvideCredentials for Credentials {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(Ok(self.clone()))
    }
}

impl ProvideCredentials for Arc<dyn ProvideCredentials> {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.as_ref().provide_credentials()
    }
}

/// Credentials Provider wrapper that may be shared
///
/// Newtype wrapper around `ProvideCredentials` that implements `Clone` using an internal `Arc`.
#[derive(Clone, Debug)]
pub struct SharedCredentialsProvider(Arc<dyn ProvideCredentials>);

impl SharedCredentialsProvider {
    /// Create a new SharedCredentials provider from `ProvideCredentials`
    ///
    /// The given provider will be wrapped in an internal `Arc`. If your
    /// provider is already in an `Arc`, use `SharedCredentialsProvider::from(provider)` instead.
    pub fn new(provider: impl ProvideCredentials + 'static) -> Self {
        Self(Arc::new(provider))
    }
}

impl AsRef<dyn ProvideCredentials> for SharedCredentialsProvider {
    fn as_ref(&self) -> &(dyn ProvideCredentials + 'static) {
        self.0.as_ref()
    }
}

impl From<Arc<dyn ProvideCredentials>> for SharedCredentialsProvider {
    fn from(provider: Arc<dyn ProvideCredentials>) -> Self {
        SharedCredentialsProvider(provider)
    }
}

impl ProvideCredentials for SharedCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }
}
