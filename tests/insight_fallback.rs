//! Fallback-chain behavior, exercised through a scripted completion client.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use insight_lens::insights::{
    ALL_CANDIDATES_FAILED_MESSAGE, CompletionClient, CompletionError, CompletionErrorKind,
    InsightRequester, NOT_CONFIGURED_MESSAGE,
};

/// Returns a scripted outcome per call, in order, and records the models asked for.
struct ScriptedClient {
    script: Vec<Result<String, (CompletionErrorKind, &'static str)>>,
    calls: AtomicUsize,
    models_seen: std::sync::Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(script: Vec<Result<String, (CompletionErrorKind, &'static str)>>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            models_seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn models(&self) -> Vec<String> {
        self.models_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        model: &str,
        _system_prompt: &str,
        _user_prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        self.models_seen.lock().unwrap().push(model.to_string());
        match self.script.get(idx) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err((kind, message))) => Err(CompletionError {
                kind: *kind,
                message: message.to_string(),
            }),
            None => panic!("scripted client called more times than scripted"),
        }
    }
}

fn requester_with(
    client: Arc<ScriptedClient>,
    candidates: &[&str],
) -> (InsightRequester, Arc<ScriptedClient>) {
    let requester = InsightRequester::new(
        Some(client.clone()),
        candidates.iter().map(|s| s.to_string()).collect(),
        500,
    );
    (requester, client)
}

#[tokio::test]
async fn first_candidate_success_makes_one_call() {
    let client = Arc::new(ScriptedClient::new(vec![Ok("insights".to_string())]));
    let (requester, client) = requester_with(client, &["primary", "backup"]);

    let response = requester.request("some feedback").await;

    assert_eq!(response.text, "insights");
    assert_eq!(response.model_used.as_deref(), Some("primary"));
    assert!(!response.fallback_used);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn quota_failure_falls_through_to_backup() {
    let client = Arc::new(ScriptedClient::new(vec![
        Err((CompletionErrorKind::QuotaExceeded, "quota")),
        Ok("backup insights".to_string()),
    ]));
    let (requester, client) = requester_with(client, &["primary", "backup"]);

    let response = requester.request("some feedback").await;

    assert_eq!(response.text, "backup insights");
    assert_eq!(response.model_used.as_deref(), Some("backup"));
    assert!(response.fallback_used);
    assert_eq!(client.models(), vec!["primary", "backup"]);
}

#[tokio::test]
async fn model_unavailable_also_falls_through() {
    let client = Arc::new(ScriptedClient::new(vec![
        Err((CompletionErrorKind::ModelUnavailable, "gone")),
        Ok("backup insights".to_string()),
    ]));
    let (requester, _) = requester_with(client, &["primary", "backup"]);

    let response = requester.request("x").await;

    assert_eq!(response.model_used.as_deref(), Some("backup"));
    assert!(response.fallback_used);
}

#[tokio::test]
async fn all_candidates_exhausted_returns_fixed_message() {
    let client = Arc::new(ScriptedClient::new(vec![
        Err((CompletionErrorKind::QuotaExceeded, "quota")),
        Err((CompletionErrorKind::ModelUnavailable, "gone")),
    ]));
    let (requester, client) = requester_with(client, &["primary", "backup"]);

    let response = requester.request("x").await;

    assert_eq!(response.text, ALL_CANDIDATES_FAILED_MESSAGE);
    assert_eq!(response.model_used, None);
    assert!(response.fallback_used);
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn other_error_aborts_without_trying_backup() {
    let client = Arc::new(ScriptedClient::new(vec![Err((
        CompletionErrorKind::Other,
        "bad credentials",
    ))]));
    let (requester, client) = requester_with(client, &["primary", "backup"]);

    let response = requester.request("x").await;

    assert!(response.text.contains("Insight request failed"));
    assert!(response.text.contains("bad credentials"));
    assert_eq!(response.model_used, None);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn other_error_on_backup_reports_fallback_used() {
    let client = Arc::new(ScriptedClient::new(vec![
        Err((CompletionErrorKind::QuotaExceeded, "quota")),
        Err((CompletionErrorKind::Other, "timeout")),
    ]));
    let (requester, client) = requester_with(client, &["primary", "backup"]);

    let response = requester.request("x").await;

    assert!(response.text.contains("timeout"));
    assert!(response.fallback_used);
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn no_client_returns_not_configured_without_calls() {
    let requester = InsightRequester::new(None, vec!["primary".to_string()], 500);

    let response = requester.request("x").await;

    assert_eq!(response.text, NOT_CONFIGURED_MESSAGE);
    assert!(!requester.is_configured());
    assert!(!response.fallback_used);
}

#[tokio::test]
async fn empty_candidate_list_returns_not_configured() {
    let client = Arc::new(ScriptedClient::new(vec![]));
    let (requester, client) = requester_with(client, &[]);

    let response = requester.request("x").await;

    assert_eq!(response.text, NOT_CONFIGURED_MESSAGE);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn single_candidate_quota_failure_exhausts_immediately() {
    let client = Arc::new(ScriptedClient::new(vec![Err((
        CompletionErrorKind::QuotaExceeded,
        "quota",
    ))]));
    let (requester, client) = requester_with(client, &["only"]);

    let response = requester.request("x").await;

    assert_eq!(response.text, ALL_CANDIDATES_FAILED_MESSAGE);
    assert!(!response.fallback_used);
    assert_eq!(client.call_count(), 1);
}
