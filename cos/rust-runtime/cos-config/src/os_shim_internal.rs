/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Access to the process environment that tests can replace.

use std::collections::HashMap;
use std::env::VarError;
use std::fmt;
use std::sync::Arc;

/// Environment variable abstraction
///
/// Environment variables are global to a process, which makes them hard to test with a
/// multi-threaded test runner. `Env` reads either the real process environment
/// ([`std::env::var`]) or a fixed map.
///
/// Cloning is cheap: faked environments live behind an `Arc`.
#[derive(Clone)]
pub struct Env(Arc<Inner>);

enum Inner {
    Real,
    Fake(HashMap<String, String>),
}

impl Default for Env {
    fn default() -> Self {
        Self::real()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Inner::Real => f.write_str("Env::Real"),
            Inner::Fake(vars) => f.debug_tuple("Env::Fake").field(&vars.len()).finish(),
        }
    }
}

impl Env {
    /// Reads the variable `key`.
    pub fn get(&self, key: &str) -> Result<String, VarError> {
        match self.0.as_ref() {
            Inner::Real => std::env::var(key),
            Inner::Fake(vars) => vars.get(key).cloned().ok_or(VarError::NotPresent),
        }
    }

    /// Creates a fake environment holding exactly `vars`.
    ///
    /// ```rust
    /// use cos_config::os_shim_internal::Env;
    /// let env = Env::from_slice(&[("AWS_RETRY_MODE", "adaptive")]);
    /// assert_eq!(env.get("AWS_RETRY_MODE").unwrap(), "adaptive");
    /// ```
    pub fn from_slice(vars: &[(&str, &str)]) -> Self {
        Self(Arc::new(Inner::Fake(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )))
    }

    /// The environment of the current process.
    pub fn real() -> Self {
        Self(Arc::new(Inner::Real))
    }
}

impl From<HashMap<String, String>> for Env {
    fn from(vars: HashMap<String, String>) -> Self {
        Self(Arc::new(Inner::Fake(vars)))
    }
}
