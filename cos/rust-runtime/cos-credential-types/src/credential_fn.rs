/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::provider::{self, future, ProvideCredentials};
use std::fmt::{self, Debug, Formatter};
use std::future::Future;

/// A [`ProvideCredentials`] implemented by a closure.
///
/// See [`provide_credentials_fn`] for more details.
#[derive(Copy, Clone)]
pub struct ProvideCredentialsFn<T> {
    f: T,
}

impl<T> Debug for ProvideCredentialsFn<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ProvideCredentialsFn")
    }
}

impl<T, F> ProvideCredentials for ProvideCredentialsFn<T>
where
    T: Fn() -> F + Send + Sync,
    F: Future<Output = provider::Result> + Send + 'static,
{
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new((self.f)())
    }
}

/// Returns a new credentials provider built with the given closure. This allows you
/// to create a [`ProvideCredentials`] implementation from an async block that returns
/// a [`provider::Result`].
///
/// # Examples
///
/// ```no_run
/// use cos_credential_types::{provide_credentials_fn, Credentials};
///
/// async fn load_credentials() -> Credentials {
///     todo!()
/// }
///
/// provide_credentials_fn(|| async {
///     // Async process to retrieve credentials goes here
///     let credentials = load_credentials().await;
///     Ok(credentials)
/// });
/// ```
pub fn provide_credentials_fn<T, F>(f: T) -> ProvideCredentialsFn<T>
where
    T: Fn() -> F + Send + Sync,
    F: Future<Output = provider::Result> + Send + 'static,
{
    ProvideCredentialsFn { f }
}
