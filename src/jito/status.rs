//! Bundle landing confirmation via `getBundleStatuses` polling

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::client::{EngineClient, BUNDLE_STATUS_TIMEOUT};
use super::error::describe_engine_err;

pub const BUNDLE_CONFIRMATION_FAILED: &str = "Bundle confirmation failed";
pub const LANDING_TIMEOUT_ERROR: &str = "Timeout waiting for bundle confirmation";

/// Confirmation state of a submitted bundle as seen by one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BundleStatus {
    /// The engine has not resolved the bundle yet
    Pending,
    Landed { slot: Option<u64> },
    Failed { error: String },
    /// The poll itself failed; says nothing about the bundle
    Unknown,
}

impl BundleStatus {
    /// `Landed` and `Failed` end polling; `Pending` and `Unknown` do not
    pub fn is_terminal(&self) -> bool {
        matches!(self, BundleStatus::Landed { .. } | BundleStatus::Failed { .. })
    }
}

/// Final answer of [`wait_for_landing`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandingOutcome {
    Landed { slot: Option<u64> },
    /// Rejected on-chain or by the engine; resubmitting the same bundle won't help
    Failed { error: String },
    /// No terminal status before the deadline; the bundle may still land
    TimedOut,
}

impl LandingOutcome {
    pub fn landed(&self) -> bool {
        matches!(self, LandingOutcome::Landed { .. })
    }

    pub fn slot(&self) -> Option<u64> {
        match self {
            LandingOutcome::Landed { slot } => *slot,
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LandingOutcome::Landed { .. } => None,
            LandingOutcome::Failed { error } => Some(error),
            LandingOutcome::TimedOut => Some(LANDING_TIMEOUT_ERROR),
        }
    }
}

/// Interval schedule between polls
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PollStrategy {
    /// Constant interval; total request volume is bounded by timeout / interval
    #[default]
    Fixed,
    /// Growing interval capped at `max_interval`, for rate-limited deployments
    Exponential { multiplier: f64, max_interval: Duration },
}

impl PollStrategy {
    fn schedule(&self, poll_interval: Duration) -> PollSchedule {
        match *self {
            PollStrategy::Fixed => PollSchedule::Fixed(poll_interval),
            PollStrategy::Exponential {
                multiplier,
                max_interval,
            } => PollSchedule::Exponential(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(poll_interval)
                    .with_multiplier(multiplier)
                    .with_max_interval(max_interval.max(poll_interval))
                    .with_randomization_factor(0.0)
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        }
    }
}

enum PollSchedule {
    Fixed(Duration),
    Exponential(backoff::ExponentialBackoff),
}

impl PollSchedule {
    fn next_delay(&mut self) -> Duration {
        match self {
            PollSchedule::Fixed(interval) => *interval,
            PollSchedule::Exponential(backoff) => backoff
                .next_backoff()
                .unwrap_or(backoff.max_interval),
        }
    }
}

/// Anything that can answer "what is the status of this bundle right now"
#[async_trait]
pub trait BundleStatusSource: Send + Sync {
    async fn get_bundle_status(&self, bundle_id: &str) -> BundleStatus;
}

/// Poll `source` until the bundle lands, fails, or `timeout` elapses.
///
/// `Failed` is returned immediately and never retried. `Unknown` polls are
/// treated like `Pending`.
pub async fn wait_for_landing<S>(
    source: &S,
    bundle_id: &str,
    timeout: Duration,
    poll_interval: Duration,
    strategy: PollStrategy,
) -> LandingOutcome
where
    S: BundleStatusSource + ?Sized,
{
    let start = Instant::now();
    let mut schedule = strategy.schedule(poll_interval);

    while start.elapsed() < timeout {
        match source.get_bundle_status(bundle_id).await {
            BundleStatus::Landed { slot } => {
                info!("✅ Bundle {} landed in slot {:?}", bundle_id, slot);
                return LandingOutcome::Landed { slot };
            }
            BundleStatus::Failed { error } => {
                warn!("Bundle {} failed: {}", bundle_id, error);
                return LandingOutcome::Failed { error };
            }
            BundleStatus::Unknown => {
                debug!("Bundle {} status unknown, continuing to poll", bundle_id);
            }
            BundleStatus::Pending => {}
        }

        sleep(schedule.next_delay()).await;
    }

    warn!("Bundle {} timed out waiting for landing after {:?}", bundle_id, timeout);
    LandingOutcome::TimedOut
}

/// Tracks bundle confirmation through the Block Engine
pub struct BundleStatusTracker {
    engine: Arc<EngineClient>,
    strategy: PollStrategy,
}

impl BundleStatusTracker {
    pub fn new(engine: Arc<EngineClient>, strategy: PollStrategy) -> Self {
        Self { engine, strategy }
    }

    /// One `getBundleStatuses` poll. Transport and protocol failures map to
    /// [`BundleStatus::Unknown`].
    pub async fn get_bundle_status(&self, bundle_id: &str) -> BundleStatus {
        let response: Result<Option<Value>, _> = self
            .engine
            .call("getBundleStatuses", json!([[bundle_id]]), BUNDLE_STATUS_TIMEOUT)
            .await;

        match response {
            Ok(result) => {
                let status = classify_status_result(result.as_ref());
                debug!("Bundle {} status: {:?}", bundle_id, status);
                status
            }
            Err(e) => {
                debug!("Bundle {} status poll failed: {}", bundle_id, e);
                BundleStatus::Unknown
            }
        }
    }

    /// Poll until terminal status or timeout
    pub async fn wait_for_bundle_landing(
        &self,
        bundle_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> LandingOutcome {
        wait_for_landing(self, bundle_id, timeout, poll_interval, self.strategy).await
    }
}

#[async_trait]
impl BundleStatusSource for BundleStatusTracker {
    async fn get_bundle_status(&self, bundle_id: &str) -> BundleStatus {
        BundleStatusTracker::get_bundle_status(self, bundle_id).await
    }
}

/// Normalize a `getBundleStatuses` result.
///
/// The engine is inconsistent about nesting: `err`, the confirmation field
/// and `slot` may sit on the entry itself or under `entry.status`. Each is
/// looked up on the inner object first, then on the entry.
pub fn classify_status_result(result: Option<&Value>) -> BundleStatus {
    let value = match result {
        None | Some(Value::Null) => return BundleStatus::Pending,
        Some(result) => result.get("value"),
    };

    let entries = match value {
        None | Some(Value::Null) => return BundleStatus::Pending,
        Some(Value::Array(entries)) => entries,
        Some(_) => return BundleStatus::Unknown,
    };

    let entry = match entries.first() {
        None | Some(Value::Null) => return BundleStatus::Pending,
        Some(Value::Object(entry)) => entry,
        Some(_) => return BundleStatus::Unknown,
    };

    let inner = match entry.get("status") {
        Some(Value::Object(inner)) => inner,
        _ => entry,
    };

    if let Some(err) = candidates(inner, entry, &["err"]).find(|err| is_populated_err(err)) {
        return BundleStatus::Failed {
            error: describe_engine_err(err),
        };
    }

    let confirmation = candidates(inner, entry, &["confirmationStatus", "confirmation_status"])
        .find_map(Value::as_str);

    match confirmation {
        Some("failed") | Some("rejected") => BundleStatus::Failed {
            error: BUNDLE_CONFIRMATION_FAILED.to_string(),
        },
        Some("finalized") | Some("confirmed") => BundleStatus::Landed {
            slot: candidates(inner, entry, &["slot"]).find_map(Value::as_u64),
        },
        _ => BundleStatus::Unknown,
    }
}

/// Values for `keys` on the inner level first, then the outer one
fn candidates<'a>(
    inner: &'a Map<String, Value>,
    outer: &'a Map<String, Value>,
    keys: &'a [&'a str],
) -> impl Iterator<Item = &'a Value> + 'a {
    [inner, outer]
        .into_iter()
        .flat_map(move |level| keys.iter().filter_map(move |key| level.get(*key)))
}

/// `{"Ok": null}` is how a successful `Result` serializes; not an error
fn is_populated_err(err: &Value) -> bool {
    match err {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(s) => !s.is_empty(),
        Value::Object(map) => !(map.len() == 1 && map.contains_key("Ok")),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jito::test_support::test_config;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays a fixed status sequence, repeating the last entry
    struct ScriptedSource {
        script: Mutex<VecDeque<BundleStatus>>,
        polls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(statuses: Vec<BundleStatus>) -> Self {
            Self {
                script: Mutex::new(statuses.into()),
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> usize {
            *self.polls.lock()
        }
    }

    #[async_trait]
    impl BundleStatusSource for ScriptedSource {
        async fn get_bundle_status(&self, _bundle_id: &str) -> BundleStatus {
            *self.polls.lock() += 1;
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or(BundleStatus::Pending)
            }
        }
    }

    fn tracker_for(url: &str) -> BundleStatusTracker {
        BundleStatusTracker::new(
            Arc::new(EngineClient::new(&test_config(url)).unwrap()),
            PollStrategy::Fixed,
        )
    }

    #[test]
    fn test_no_entries_is_pending() {
        assert_eq!(classify_status_result(None), BundleStatus::Pending);
        assert_eq!(
            classify_status_result(Some(&json!({"context": {"slot": 1}, "value": []}))),
            BundleStatus::Pending
        );
        assert_eq!(
            classify_status_result(Some(&json!({"context": {"slot": 1}, "value": [null]}))),
            BundleStatus::Pending
        );
        assert_eq!(
            classify_status_result(Some(&json!({"context": {"slot": 1}, "value": null}))),
            BundleStatus::Pending
        );
    }

    #[test]
    fn test_landed_flat_shape() {
        let result = json!({"value": [{
            "bundle_id": "b1",
            "transactions": ["sig"],
            "slot": 242804011,
            "confirmation_status": "finalized",
            "err": {"Ok": null}
        }]});
        assert_eq!(
            classify_status_result(Some(&result)),
            BundleStatus::Landed { slot: Some(242804011) }
        );
    }

    #[test]
    fn test_landed_nested_shape() {
        let result = json!({"value": [{
            "bundle_id": "b1",
            "slot": 77,
            "status": {"confirmationStatus": "confirmed", "err": null}
        }]});
        assert_eq!(
            classify_status_result(Some(&result)),
            BundleStatus::Landed { slot: Some(77) }
        );
    }

    #[test]
    fn test_err_found_on_either_level() {
        let outer = json!({"value": [{
            "status": {"confirmationStatus": "confirmed"},
            "err": {"InstructionError": [0, "Custom"]}
        }]});
        match classify_status_result(Some(&outer)) {
            BundleStatus::Failed { error } => assert!(error.contains("InstructionError")),
            other => panic!("unexpected status: {:?}", other),
        }

        let inner = json!({"value": [{"status": {"err": "BundleDropped"}}]});
        assert_eq!(
            classify_status_result(Some(&inner)),
            BundleStatus::Failed { error: "BundleDropped".to_string() }
        );
    }

    #[test]
    fn test_rejected_confirmation() {
        for confirmation in ["failed", "rejected"] {
            let result = json!({"value": [{"confirmationStatus": confirmation}]});
            assert_eq!(
                classify_status_result(Some(&result)),
                BundleStatus::Failed { error: BUNDLE_CONFIRMATION_FAILED.to_string() }
            );
        }
    }

    #[test]
    fn test_other_shapes_are_unknown() {
        assert_eq!(
            classify_status_result(Some(&json!({"value": [{"confirmation_status": "processed"}]}))),
            BundleStatus::Unknown
        );
        assert_eq!(
            classify_status_result(Some(&json!({"value": ["b1"]}))),
            BundleStatus::Unknown
        );
        assert_eq!(
            classify_status_result(Some(&json!({"value": {"unexpected": true}}))),
            BundleStatus::Unknown
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BundleStatus::Pending.is_terminal());
        assert!(!BundleStatus::Unknown.is_terminal());
        assert!(BundleStatus::Landed { slot: None }.is_terminal());
        assert!(BundleStatus::Failed { error: String::new() }.is_terminal());
    }

    #[test]
    fn test_outcome_accessors() {
        let timed_out = LandingOutcome::TimedOut;
        assert!(!timed_out.landed());
        assert_eq!(timed_out.error(), Some("Timeout waiting for bundle confirmation"));

        let landed = LandingOutcome::Landed { slot: Some(9) };
        assert!(landed.landed());
        assert_eq!(landed.slot(), Some(9));
        assert_eq!(landed.error(), None);
    }

    #[tokio::test]
    async fn test_get_bundle_status_unknown_bundle_is_pending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/bundles")
            .match_body(mockito::Matcher::Json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getBundleStatuses",
                "params": [["b1"]]
            })))
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":280999028},"value":[]}}"#)
            .expect(1)
            .create_async()
            .await;

        assert_eq!(tracker_for(&server.url()).get_bundle_status("b1").await, BundleStatus::Pending);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_bundle_status_transport_failure_is_unknown() {
        let tracker = tracker_for("http://127.0.0.1:1");
        assert_eq!(tracker.get_bundle_status("b1").await, BundleStatus::Unknown);
    }

    #[tokio::test]
    async fn test_get_bundle_status_protocol_error_is_unknown() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/bundles")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"internal"}}"#)
            .create_async()
            .await;

        assert_eq!(tracker_for(&server.url()).get_bundle_status("b1").await, BundleStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_lands_after_two_intervals() {
        let source = ScriptedSource::new(vec![
            BundleStatus::Pending,
            BundleStatus::Pending,
            BundleStatus::Landed { slot: Some(42) },
        ]);
        let interval = Duration::from_millis(2_000);
        let start = Instant::now();

        let outcome = wait_for_landing(
            &source,
            "b1",
            Duration::from_millis(60_000),
            interval,
            PollStrategy::Fixed,
        )
        .await;

        assert_eq!(outcome, LandingOutcome::Landed { slot: Some(42) });
        assert_eq!(outcome.slot(), Some(42));
        assert_eq!(source.polls(), 3);
        let waited = start.elapsed();
        assert!(waited >= interval * 2 && waited < interval * 3, "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_unknown_keeps_polling() {
        let source = ScriptedSource::new(vec![
            BundleStatus::Unknown,
            BundleStatus::Pending,
            BundleStatus::Unknown,
            BundleStatus::Landed { slot: None },
        ]);

        let outcome = wait_for_landing(
            &source,
            "b1",
            Duration::from_secs(60),
            Duration::from_secs(2),
            PollStrategy::Fixed,
        )
        .await;

        assert!(outcome.landed());
        assert_eq!(source.polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_failed_returns_immediately() {
        let source = ScriptedSource::new(vec![
            BundleStatus::Pending,
            BundleStatus::Failed { error: "Bundle confirmation failed".to_string() },
            BundleStatus::Landed { slot: Some(1) },
        ]);

        let outcome = wait_for_landing(
            &source,
            "b1",
            Duration::from_secs(60),
            Duration::from_secs(2),
            PollStrategy::Fixed,
        )
        .await;

        assert_eq!(
            outcome,
            LandingOutcome::Failed { error: "Bundle confirmation failed".to_string() }
        );
        assert_eq!(source.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_while_pending() {
        let source = ScriptedSource::new(vec![BundleStatus::Pending]);

        let outcome = wait_for_landing(
            &source,
            "b1",
            Duration::from_millis(5_000),
            Duration::from_millis(2_000),
            PollStrategy::Fixed,
        )
        .await;

        assert_eq!(outcome, LandingOutcome::TimedOut);
        assert!(!outcome.landed());
        assert_eq!(outcome.error(), Some("Timeout waiting for bundle confirmation"));
        // polls at 0s, 2s, 4s
        assert_eq!(source.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_strategy_polls_less() {
        let source = ScriptedSource::new(vec![BundleStatus::Pending]);

        let outcome = wait_for_landing(
            &source,
            "b1",
            Duration::from_millis(10_000),
            Duration::from_millis(1_000),
            PollStrategy::Exponential {
                multiplier: 2.0,
                max_interval: Duration::from_millis(4_000),
            },
        )
        .await;

        assert_eq!(outcome, LandingOutcome::TimedOut);
        // polls at 0s, 1s, 3s, 7s
        assert_eq!(source.polls(), 4);
    }
}
