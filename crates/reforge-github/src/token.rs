//! GitHub token resolution with an explicit, resettable cache

use reforge_core::{ReforgeError, Result};
use std::sync::Mutex;

const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
const LEGACY_TOKEN_ENV: &str = "GH_TOKEN";

/// Caches the resolved GitHub token for the lifetime of the composition
/// root that owns it.
///
/// The cache is a value, not module state; test harnesses call [`reset`]
/// between cases.
///
/// [`reset`]: TokenCache::reset
#[derive(Default)]
pub struct TokenCache {
    cached: Mutex<Option<Option<String>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the token from the environment, consulting the cache first.
    ///
    /// With `required`, a missing token is an error. An environment that
    /// only sets `GH_TOKEN` is rejected with a rename hint either way.
    pub fn resolve(&self, required: bool) -> Result<Option<String>> {
        let mut cached = self.cached.lock().unwrap();

        if cached.is_none() {
            *cached = Some(Self::read_env()?);
        }

        let token = cached.as_ref().unwrap().clone();
        if required && token.is_none() {
            return Err(ReforgeError::Config(format!(
                "{} environment variable is not set",
                GITHUB_TOKEN_ENV
            )));
        }

        Ok(token)
    }

    /// Drop the cached value so the next resolve re-reads the environment
    pub fn reset(&self) {
        *self.cached.lock().unwrap() = None;
    }

    fn read_env() -> Result<Option<String>> {
        let token = std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if token.is_none() && std::env::var(LEGACY_TOKEN_ENV).is_ok() {
            return Err(ReforgeError::Config(format!(
                "{} environment variable is not set. Rename {} to {}.",
                GITHUB_TOKEN_ENV, LEGACY_TOKEN_ENV, GITHUB_TOKEN_ENV
            )));
        }

        Ok(token)
    }
}
