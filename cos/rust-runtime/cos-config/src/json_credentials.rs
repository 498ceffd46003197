/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Parsing of the JSON credentials document served by credentials endpoints.
//!
//! ```json
//! {
//!   "Code": "Success",
//!   "AccessKeyId": "ASIARTEST",
//!   "SecretAccessKey": "xjtest",
//!   "Token": "IQote///test",
//!   "Expiration": "2021-09-18T03:31:56Z"
//! }
//! ```

use cos_credential_types::provider::CredentialsError;
use cos_credential_types::Credentials;
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const SUCCESS_CODE: &str = "Success";

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsDocument {
    code: Option<String>,
    message: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<String>,
}

/// A credentials document that could not be turned into [`Credentials`].
#[derive(Debug)]
#[non_exhaustive]
pub enum InvalidJsonCredentials {
    /// The response was not a JSON object of the expected shape.
    JsonError(serde_json::Error),
    /// The endpoint reported an error instead of credentials.
    Error {
        /// The `Code` of the document.
        code: String,
        /// The `Message` of the document, if any.
        message: Option<String>,
    },
    /// A required field was missing or empty.
    MissingField(&'static str),
    /// `Expiration` was not an RFC 3339 timestamp.
    InvalidExpiration {
        /// The value of `Expiration`.
        value: String,
        /// Cause of the error.
        source: time::error::Parse,
    },
}

impl fmt::Display for InvalidJsonCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidJsonCredentials::JsonError(_) => {
                write!(f, "invalid JSON in the credentials response")
            }
            InvalidJsonCredentials::Error { code, message } => match message {
                Some(message) => write!(f, "the credentials endpoint returned an error ({code}): {message}"),
                None => write!(f, "the credentials endpoint returned an error ({code})"),
            },
            InvalidJsonCredentials::MissingField(field) => {
                write!(f, "expected field `{field}` in the credentials response")
            }
            InvalidJsonCredentials::InvalidExpiration { value, .. } => {
                write!(f, "invalid credentials expiration `{value}`")
            }
        }
    }
}

impl Error for InvalidJsonCredentials {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InvalidJsonCredentials::JsonError(err) => Some(err),
            InvalidJsonCredentials::InvalidExpiration { source, .. } => Some(source),
            InvalidJsonCredentials::Error { .. } | InvalidJsonCredentials::MissingField(_) => None,
        }
    }
}

impl From<InvalidJsonCredentials> for CredentialsError {
    fn from(err: InvalidJsonCredentials) -> Self {
        match err {
            err @ InvalidJsonCredentials::Error { .. } => CredentialsError::provider_error(err),
            err => CredentialsError::unhandled(err),
        }
    }
}

/// Parses a credentials document into [`Credentials`] attributed to `provider_name`.
pub fn parse_json_credentials(
    body: &str,
    provider_name: &'static str,
) -> Result<Credentials, InvalidJsonCredentials> {
    let document: CredentialsDocument =
        serde_json::from_str(body).map_err(InvalidJsonCredentials::JsonError)?;

    if let Some(code) = document.code {
        if code != SUCCESS_CODE {
            return Err(InvalidJsonCredentials::Error {
                code,
                message: document.message,
            });
        }
    }

    let access_key_id = required(document.access_key_id, "AccessKeyId")?;
    let secret_access_key = required(document.secret_access_key, "SecretAccessKey")?;
    let session_token = document.token.filter(|token| !token.is_empty());
    let expiration = document
        .expiration
        .map(|value| parse_expiration(&value))
        .transpose()?;

    Ok(Credentials::new(
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
        provider_name,
    ))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, InvalidJsonCredentials> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(InvalidJsonCredentials::MissingField(field))
}

// Some endpoints write the UTC offset as `+0000`, which RFC 3339 does not allow.
fn parse_expiration(value: &str) -> Result<SystemTime, InvalidJsonCredentials> {
    let normalized = value.replace("+0000", "Z");
    OffsetDateTime::parse(&normalized, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|source| InvalidJsonCredentials::InvalidExpiration {
            value: value.to_owned(),
            source,
        })
}
