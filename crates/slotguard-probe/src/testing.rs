//! In-memory probers for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::prober::{ProbeFuture, ProbeResult, Prober};

/// Replays a fixed script of results, one per call.
///
/// Once the script runs out every call returns the fallback result, which
/// is a transport error unless built with [`ScriptedProber::repeating`].
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeResult>>,
    fallback: ProbeResult,
    calls: AtomicU32,
    urls: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn new(script: Vec<ProbeResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: ProbeResult::transport("script exhausted"),
            calls: AtomicU32::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Return `result` on every call.
    pub fn repeating(result: ProbeResult) -> Self {
        Self {
            fallback: result,
            ..Self::new(Vec::new())
        }
    }

    /// Number of probes issued so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs probed so far, in order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn next(&self, url: &str) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Prober for ScriptedProber {
    fn probe<'a>(&'a self, url: &'a str, _timeout: Duration) -> ProbeFuture<'a> {
        let result = self.next(url);
        Box::pin(async move { result })
    }
}

/// Routes probes to one of two scripted probers by URL prefix, so a single
/// sampler can serve a production and a staging target.
pub struct RoutedProber {
    routes: Vec<(String, ScriptedProber)>,
}

impl RoutedProber {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn route(mut self, prefix: impl Into<String>, prober: ScriptedProber) -> Self {
        self.routes.push((prefix.into(), prober));
        self
    }

    /// The scripted prober serving `prefix`.
    pub fn get(&self, prefix: &str) -> Option<&ScriptedProber> {
        self.routes
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, prober)| prober)
    }
}

impl Default for RoutedProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for RoutedProber {
    fn probe<'a>(&'a self, url: &'a str, timeout: Duration) -> ProbeFuture<'a> {
        match self.routes.iter().find(|(prefix, _)| url.starts_with(prefix.as_str())) {
            Some((_, prober)) => prober.probe(url, timeout),
            None => Box::pin(async move { ProbeResult::transport(format!("no route for {url}")) }),
        }
    }
}
