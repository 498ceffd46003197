/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

#![allow(clippy::derive_partial_eq_without_eq)]
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! Credentials and the provider abstraction used to sign COS requests.
//!
//! A [`ProvideCredentials`](provider::ProvideCredentials) implementation is consulted once per
//! request. Implementations are expected to cache: the request path does not.

mod credential_fn;
mod credentials;
pub mod provider;

pub use credential_fn::{provide_credentials_fn, ProvideCredentialsFn};
pub use credentials::Credentials;
pub use provider::SharedCredentialsProvider;
