//! Process-lifetime memo of "nice" human-facing film pages.
//!
//! Some sources only publish ticketing links, but also host a readable film
//! page whose address can be guessed from the film's id and title. Checking
//! that guess costs a request, and the answer rarely changes, so it is looked
//! up once per `(title, id)` per process and remembered in memory. Only a
//! definite answer is remembered: a network failure or a server error is
//! retried on the next lookup. Answers are never written to the daily cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::http::HttpClient;

type Memo = HashMap<(String, String), Option<String>>;

/// Memoizing URL prober.
#[derive(Debug)]
pub struct UrlProbe {
    http: HttpClient,
    memo: Mutex<Memo>,
}

impl UrlProbe {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `candidate` if it answers a HEAD request with 2xx, `None`
    /// otherwise. Once the server has answered 2xx or 404 for `(title, id)`
    /// that answer is reused for the rest of the process.
    pub async fn resolve(&self, title: &str, id: &str, candidate: &str) -> Option<String> {
        let known = self.remembered(title, id);
        if let Some(known) = known {
            return known;
        }

        let Some(exists) = self.http.probe(candidate).await else {
            debug!(title = %title, id = %id, candidate = %candidate, "film page lookup inconclusive");
            return None;
        };
        let found = exists.then(|| candidate.to_string());
        debug!(title = %title, id = %id, candidate = %candidate, found = exists, "probed film page");

        // A concurrent caller may have raced us here; either answer is fine.
        let key = (title.to_string(), id.to_string());
        self.memo().entry(key).or_insert(found).clone()
    }

    /// Returns the remembered answer for `(title, id)`, if it was looked up.
    pub fn remembered(&self, title: &str, id: &str) -> Option<Option<String>> {
        self.memo()
            .get(&(title.to_string(), id.to_string()))
            .cloned()
    }

    /// Records an answer without probing.
    pub fn remember(&self, title: &str, id: &str, url: Option<String>) {
        self.memo().insert((title.to_string(), id.to_string()), url);
    }

    /// Number of remembered answers.
    pub fn len(&self) -> usize {
        self.memo().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo().is_empty()
    }

    fn memo(&self) -> MutexGuard<'_, Memo> {
        // The map holds plain values; a panic elsewhere cannot leave it torn.
        self.memo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpConfig;
    use crate::sources::testing::serve_statuses;
    use std::time::Duration;

    fn probe() -> UrlProbe {
        let http = HttpClient::new(&HttpConfig::default().with_timeout(Duration::from_secs(2)))
            .unwrap();
        UrlProbe::new(http)
    }

    #[tokio::test]
    async fn network_failure_is_not_remembered() {
        let memo = probe();
        assert!(memo.is_empty());

        let first = memo.resolve("Persona", "42", "http://127.0.0.1:9/persona").await;
        assert_eq!(first, None);
        assert_eq!(memo.remembered("Persona", "42"), None);
        assert!(memo.is_empty());
    }

    #[tokio::test]
    async fn server_error_is_retried_until_the_page_answers() {
        let memo = probe();
        let base = serve_statuses(vec![(503, String::new()), (200, String::new())]);
        let candidate = format!("{}film/42-persona", base);

        assert_eq!(memo.resolve("Persona", "42", &candidate).await, None);
        assert_eq!(memo.remembered("Persona", "42"), None);

        let found = memo.resolve("Persona", "42", &candidate).await;
        assert_eq!(found.as_deref(), Some(candidate.as_str()));
        assert_eq!(memo.remembered("Persona", "42"), Some(Some(candidate)));
    }

    #[tokio::test]
    async fn missing_page_is_remembered_as_none() {
        let memo = probe();
        let base = serve_statuses(vec![(404, String::new())]);
        let candidate = format!("{}film/42-persona", base);

        assert_eq!(memo.resolve("Persona", "42", &candidate).await, None);
        assert_eq!(memo.remembered("Persona", "42"), Some(None));

        // The server is gone; only the memo can answer now.
        assert_eq!(memo.resolve("Persona", "42", &candidate).await, None);
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn remembered_answer_short_circuits() {
        let probe = probe();
        probe.remember("Persona", "42", Some("https://example.com/persona".into()));

        // The candidate is unreachable; only the memo can produce this answer.
        let url = probe.resolve("Persona", "42", "http://127.0.0.1:9/persona").await;
        assert_eq!(url.as_deref(), Some("https://example.com/persona"));
    }

    #[tokio::test]
    async fn keys_are_title_and_id() {
        let probe = probe();
        probe.remember("Solaris", "1", Some("https://example.com/1".into()));
        assert_eq!(probe.remembered("Solaris", "2"), None);
        assert_eq!(probe.remembered("solaris", "1"), None);
    }
}
