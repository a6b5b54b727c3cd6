//! Helpers for testing the resolution layer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::caching::{CacheContents, ResolveError};
use crate::resolver::ImageLoad;

/// Setup function for tests.
///
/// Initializes logging to the test console. Safe to call from every test;
/// only the first call installs a subscriber.
pub(crate) fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("picfall_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// An [`ImageLoad`] that replays a script of attempt results.
///
/// Attempts beyond the script fail with a generic load failure. Every attempt
/// is counted, which is what the resolver tests assert on.
#[derive(Debug, Default)]
pub(crate) struct ScriptedLoader {
    script: Mutex<VecDeque<CacheContents<()>>>,
    attempts: AtomicUsize,
    hang: bool,
}

impl ScriptedLoader {
    /// A loader whose every attempt fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// A loader whose attempts never complete, for timeout tests.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn with_script(script: impl IntoIterator<Item = CacheContents<()>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Appends a result to the script.
    pub fn push(&self, result: CacheContents<()>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Total number of load attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ImageLoad for ScriptedLoader {
    fn load<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, CacheContents<()>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.hang {
            return futures::future::pending().boxed();
        }

        let result = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ResolveError::LoadFailure("scripted failure".into())));
        async move { result }.boxed()
    }
}
