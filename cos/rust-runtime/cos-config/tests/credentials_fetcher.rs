/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use cos_config::credentials_fetcher::{credentials_endpoint_fn, CredentialsFetcher};
use cos_credential_types::provider::{CredentialsError, ProvideCredentials};
use cos_credential_types::SharedCredentialsProvider;
use cos_smithy_async::test_util::ManualTimeSource;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

const FIRST: &str = r#"{
    "Code": "Success",
    "AccessKeyId": "ASIAFIRST",
    "SecretAccessKey": "secret",
    "Token": "token",
    "Expiration": "2024-01-01T01:00:00Z"
}"#;

const ERROR_DOCUMENT: &str = r#"{
    "Code": "InternalServiceError",
    "Message": "try again later"
}"#;

fn endpoint_with_responses(
    responses: &'static [&'static str],
) -> (CredentialsFetcher, ManualTimeSource, Arc<AtomicUsize>) {
    let time = ManualTimeSource::new(UNIX_EPOCH + Duration::from_secs(1704067200));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = CredentialsFetcher::builder(credentials_endpoint_fn({
        let calls = calls.clone();
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let body = responses[call.min(responses.len() - 1)];
            async move { Ok(body.to_string()) }
        }
    }))
    .time_source(time.clone())
    .build();
    (fetcher, time, calls)
}

#[test]
fn error_document_after_success_keeps_serving_cached_credentials() {
    let (fetcher, time, calls) = endpoint_with_responses(&[FIRST, ERROR_DOCUMENT]);
    let provider = SharedCredentialsProvider::new(fetcher.clone());

    let creds = provider
        .provide_credentials()
        .now_or_never()
        .expect("ready")
        .expect("credentials");
    assert_eq!(creds.access_key_id(), "ASIAFIRST");

    // Inside the expiration threshold the fetcher tries again, gets an error document and keeps
    // the credentials it has.
    time.advance(Duration::from_secs(50 * 60));
    let creds = fetcher
        .credentials()
        .now_or_never()
        .expect("ready")
        .expect("cached credentials");
    assert_eq!(creds.access_key_id(), "ASIAFIRST");
    assert_eq!(2, calls.load(Ordering::SeqCst));

    time.advance(Duration::from_secs(10 * 60));
    let err = fetcher
        .credentials()
        .now_or_never()
        .expect("ready")
        .expect_err("expired");
    assert!(matches!(err, CredentialsError::Expired { .. }), "{err}");
}

#[test]
fn error_document_on_first_fetch_is_a_provider_error() {
    let (fetcher, _time, _calls) = endpoint_with_responses(&[ERROR_DOCUMENT]);
    let err = fetcher
        .credentials()
        .now_or_never()
        .expect("ready")
        .expect_err("nothing cached");
    assert!(matches!(err, CredentialsError::ProviderError(_)), "{err:?}");
    let source = std::error::Error::source(&err).expect("has a source").to_string();
    assert!(source.contains("InternalServiceError"), "{source}");
}
