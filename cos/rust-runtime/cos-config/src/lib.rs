/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Configuration and credentials loading for COS clients.
//!
//! - [`environment`] reads retry settings from `AWS_RETRY_MODE` and `AWS_MAX_ATTEMPTS`.
//! - [`credentials_fetcher`] caches credentials served by a remote endpoint.
//! - [`json_credentials`] parses the documents those endpoints return.

pub mod credentials_fetcher;
pub mod environment;
pub mod json_credentials;
pub mod os_shim_internal;

pub use credentials_fetcher::CredentialsFetcher;
