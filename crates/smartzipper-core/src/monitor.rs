//! Open-episode tracking and the delayed "left open" alert.
//!
//! [`MonitorState`] holds everything the alert decision depends on and only
//! changes through pure transitions that return the next state together with
//! any [`AlertSignal`]. [`MonitorEngine`] wraps the state with its
//! configuration and the periodic check timer that exists only while
//! monitoring.
//!
//! ```text
//!   reading "0" (unset)        now - open_since >= threshold
//!  Closed ──────────────► Open ──────────────────────────► Alerted
//!    ▲                     │                                  │
//!    │   reading != "0"    │        reading != "0"            │
//!    └─────── Hide ────────┴──────────── Hide ────────────────┘
//! ```
//!
//! A change between two non-open values also yields `Hide`. Clearing is
//! idempotent for the presenter.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use smartzipper_types::{SensorValue, ValueEncoding};

use crate::config::MonitorConfig;

/// Why an alert is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertReason {
    /// The sensor has been open for at least the threshold.
    OpenTooLong {
        /// How long the current episode has lasted.
        open_for: Duration,
    },
    /// Requested by hand to exercise the presentation path.
    Test,
}

/// One-shot instruction for the alert presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSignal {
    /// Present the alert.
    Show(AlertReason),
    /// Withdraw any alert for the episode that just ended.
    Hide,
}

/// Debounced sensor value and open-episode timing.
///
/// Invariant: `alert_sent` implies `open_since` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    last_value: String,
    open_since: Option<Instant>,
    alert_sent: bool,
}

impl MonitorState {
    /// Last observed value, trimmed. Empty until the first reading.
    pub fn last_value(&self) -> &str {
        &self.last_value
    }

    /// When the current open episode started.
    pub fn open_since(&self) -> Option<Instant> {
        self.open_since
    }

    /// Whether the current episode has already alerted.
    pub fn alert_sent(&self) -> bool {
        self.alert_sent
    }

    /// Record a reading.
    ///
    /// A value equal to the previous one changes nothing. Any change to a
    /// closed or unrecognised value ends the episode and yields
    /// [`AlertSignal::Hide`], whether or not an episode was open; becoming
    /// open starts one.
    #[must_use]
    pub fn on_reading(
        self,
        raw: &str,
        encoding: &ValueEncoding,
        now: Instant,
    ) -> (Self, Option<AlertSignal>) {
        let value = raw.trim();
        if value == self.last_value {
            return (self, None);
        }

        let mut next = Self {
            last_value: value.to_string(),
            ..self
        };

        match encoding.classify(value) {
            SensorValue::Open => {
                if next.open_since.is_none() {
                    next.open_since = Some(now);
                    next.alert_sent = false;
                }
                (next, None)
            }
            SensorValue::Closed | SensorValue::Other => {
                next.open_since = None;
                next.alert_sent = false;
                (next, Some(AlertSignal::Hide))
            }
        }
    }

    /// Re-arm on (re)entering `Ready`.
    ///
    /// An episode already open when the link comes back is timed from `now`;
    /// time spent disconnected does not count.
    #[must_use]
    pub fn restart(self, encoding: &ValueEncoding, now: Instant) -> Self {
        let open = encoding.classify(&self.last_value).is_open();
        Self {
            open_since: open.then_some(now),
            alert_sent: false,
            ..self
        }
    }

    /// Compare the current episode against `threshold`.
    #[must_use]
    pub fn check(
        self,
        encoding: &ValueEncoding,
        threshold: Duration,
        now: Instant,
    ) -> (Self, Option<AlertSignal>) {
        if self.alert_sent || !encoding.classify(&self.last_value).is_open() {
            return (self, None);
        }
        let Some(since) = self.open_since else {
            return (self, None);
        };

        let open_for = now.saturating_duration_since(since);
        if open_for < threshold {
            return (self, None);
        }
        (
            Self {
                alert_sent: true,
                ..self
            },
            Some(AlertSignal::Show(AlertReason::OpenTooLong { open_for })),
        )
    }
}

/// Owns a [`MonitorState`] and drives it from readings, link readiness and a
/// periodic check.
#[derive(Debug)]
pub struct MonitorEngine {
    config: MonitorConfig,
    state: MonitorState,
    ticker: Option<Interval>,
}

impl MonitorEngine {
    /// Create an idle engine.
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: MonitorState::default(),
            ticker: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// The value encoding in use.
    pub fn encoding(&self) -> &ValueEncoding {
        &self.config.encoding
    }

    /// Whether the periodic check is running.
    pub fn is_monitoring(&self) -> bool {
        self.ticker.is_some()
    }

    /// Display label for a raw value.
    pub fn display(&self, raw: &str) -> String {
        self.config.encoding.display(raw)
    }

    /// Record a reading received now. See [`on_reading_at`](Self::on_reading_at).
    pub fn on_reading_received(&mut self, raw: &str) -> Vec<AlertSignal> {
        self.on_reading_at(raw, Instant::now())
    }

    /// Record a reading received at `received_at`.
    ///
    /// While monitoring the threshold is re-checked at once. Outside `Ready`
    /// the value is only recorded: the episode is re-timed when monitoring
    /// starts.
    pub fn on_reading_at(&mut self, raw: &str, received_at: Instant) -> Vec<AlertSignal> {
        let (state, hide) =
            std::mem::take(&mut self.state).on_reading(raw, &self.config.encoding, received_at);
        self.state = state;
        if hide.is_some() {
            debug!("Open episode ended");
        }

        let show = if self.is_monitoring() {
            self.check()
        } else {
            None
        };
        hide.into_iter().chain(show).collect()
    }

    /// Start the periodic check, re-arming the current episode.
    pub fn start_monitoring(&mut self) {
        let now = Instant::now();
        self.state = std::mem::take(&mut self.state).restart(&self.config.encoding, now);

        let period = self.config.check_interval();
        let mut ticker = tokio::time::interval_at(now + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        info!(
            interval_secs = period.as_secs(),
            threshold_secs = self.config.alert_threshold_secs,
            "Monitoring started"
        );
    }

    /// Stop the periodic check. Episode timing is left as is.
    pub fn stop_monitoring(&mut self) {
        if self.ticker.take().is_some() {
            info!("Monitoring stopped");
        }
    }

    /// Run the threshold check now.
    pub fn check(&mut self) -> Option<AlertSignal> {
        let (state, signal) = std::mem::take(&mut self.state).check(
            &self.config.encoding,
            self.config.alert_threshold(),
            Instant::now(),
        );
        self.state = state;
        if let Some(AlertSignal::Show(AlertReason::OpenTooLong { open_for })) = signal {
            info!(open_for_secs = open_for.as_secs(), "Open too long, alerting");
        }
        signal
    }

    /// Wait for the next periodic check. Never completes while not monitoring.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    const THRESHOLD: Duration = Duration::from_secs(360);

    fn engine() -> MonitorEngine {
        MonitorEngine::new(MonitorConfig::default())
    }

    fn shows(signals: &[AlertSignal]) -> usize {
        signals
            .iter()
            .filter(|s| matches!(s, AlertSignal::Show(_)))
            .count()
    }

    fn hides(signals: &[AlertSignal]) -> usize {
        signals.iter().filter(|s| **s == AlertSignal::Hide).count()
    }

    /// Advance the paused clock in check-interval steps, collecting signals
    /// the way the service loop would.
    async fn run_for(engine: &mut MonitorEngine, total: Duration) -> Vec<AlertSignal> {
        let deadline = Instant::now() + total;
        let mut signals = Vec::new();
        loop {
            tokio::select! {
                _ = engine.tick() => signals.extend(engine.check()),
                _ = time::sleep_until(deadline) => break,
            }
        }
        signals
    }

    #[test]
    fn test_state_starts_empty() {
        let state = MonitorState::default();
        assert_eq!(state.last_value(), "");
        assert!(state.open_since().is_none());
        assert!(!state.alert_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_reading_keeps_episode() {
        let encoding = ValueEncoding::default();
        let t0 = Instant::now();
        let (state, _) = MonitorState::default().on_reading("0", &encoding, t0);

        time::advance(Duration::from_secs(10)).await;
        let (state, signal) = state.on_reading("0\n", &encoding, Instant::now());
        assert_eq!(signal, None);
        assert_eq!(state.open_since(), Some(t0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_then_close_scenario_no_alert() {
        let mut engine = engine();
        engine.start_monitoring();

        let signals = engine.on_reading_received("0");
        assert!(signals.is_empty());
        let mut all = run_for(&mut engine, Duration::from_millis(300_000)).await;
        all.extend(engine.on_reading_received("1"));

        assert_eq!(shows(&all), 0);
        assert_eq!(hides(&all), 1);
        assert!(!engine.state().alert_sent());
        assert!(engine.state().open_since().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_then_open_past_threshold_alerts_once() {
        let mut engine = engine();
        engine.start_monitoring();

        let mut displays = Vec::new();
        let mut all = Vec::new();
        for raw in ["1", "0"] {
            all.extend(engine.on_reading_received(raw));
            displays.push(engine.display(raw));
        }
        all.extend(run_for(&mut engine, Duration::from_millis(360_100)).await);

        assert_eq!(displays, vec!["Zipper Closed", "Zipper Open"]);
        assert_eq!(shows(&all), 1);
        assert!(engine.state().alert_sent());

        // Still open much later: no repeat.
        let later = run_for(&mut engine, Duration::from_secs(600)).await;
        assert_eq!(shows(&later), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_just_under_threshold_never_alerts() {
        let mut engine = engine();
        engine.start_monitoring();
        engine.on_reading_received("0");

        let mut all = run_for(&mut engine, THRESHOLD - Duration::from_millis(1)).await;
        all.extend(engine.on_reading_received("1"));
        all.extend(run_for(&mut engine, Duration::from_secs(600)).await);
        assert_eq!(shows(&all), 0);
        assert_eq!(hides(&all), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reading_triggers_immediate_check() {
        let mut engine = engine();
        engine.start_monitoring();
        engine.on_reading_received("0");
        // The ticker is never polled here: only the reading drives the check.
        time::advance(THRESHOLD).await;
        let signals = engine.on_reading_received("0");
        assert!(matches!(
            signals.as_slice(),
            [AlertSignal::Show(AlertReason::OpenTooLong { open_for })] if *open_for == THRESHOLD
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_check_while_not_monitoring() {
        let mut engine = engine();
        engine.start_monitoring();
        engine.on_reading_received("0");
        time::advance(Duration::from_secs(300)).await;
        engine.stop_monitoring();

        // Past the threshold while the link is coming back.
        time::advance(Duration::from_secs(100)).await;
        assert!(engine.on_reading_received("0").is_empty());
        assert!(!engine.state().alert_sent());

        let ready_at = Instant::now();
        engine.start_monitoring();
        assert_eq!(engine.state().open_since(), Some(ready_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_change_to_non_open_clears() {
        let mut engine = engine();
        assert_eq!(engine.on_reading_received("1"), vec![AlertSignal::Hide]);
        assert_eq!(engine.on_reading_received("x"), vec![AlertSignal::Hide]);
        assert!(engine.on_reading_received("x").is_empty());
        assert!(engine.on_reading_received("0").is_empty());
        assert_eq!(engine.on_reading_received("x"), vec![AlertSignal::Hide]);
        assert_eq!(engine.on_reading_received("1"), vec![AlertSignal::Hide]);
        assert!(engine.on_reading_received(" 1 ").is_empty());
        assert_eq!(engine.display("x"), "x");
    }

    #[tokio::test(start_paused = true)]
    async fn test_episode_starts_at_receipt_time() {
        let mut engine = engine();
        let received_at = Instant::now();
        time::advance(Duration::from_secs(2)).await;
        engine.on_reading_at("0", received_at);
        assert_eq!(engine.state().open_since(), Some(received_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_value_ends_episode() {
        let mut engine = engine();
        engine.on_reading_received("0");
        time::advance(Duration::from_secs(200)).await;
        engine.on_reading_received("?");
        let t1 = Instant::now();
        engine.on_reading_received("0");
        assert_eq!(engine.state().open_since(), Some(t1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_restarts_open_timer() {
        let mut engine = engine();
        engine.start_monitoring();
        engine.on_reading_received("0");
        time::advance(Duration::from_secs(300)).await;

        // Link drops and comes back 100 s later, still open.
        engine.stop_monitoring();
        assert!(!engine.is_monitoring());
        time::advance(Duration::from_secs(100)).await;
        let reconnect = Instant::now();
        engine.start_monitoring();
        assert_eq!(engine.state().open_since(), Some(reconnect));

        // 400 s since the episode began, but only 300 s since reconnect.
        assert_eq!(shows(&run_for(&mut engine, Duration::from_secs(300)).await), 0);
        assert_eq!(shows(&run_for(&mut engine, Duration::from_secs(61)).await), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_rearms_after_alert() {
        let mut engine = engine();
        engine.start_monitoring();
        engine.on_reading_received("0");
        assert_eq!(shows(&run_for(&mut engine, THRESHOLD + Duration::from_secs(5)).await), 1);

        engine.stop_monitoring();
        // Stopping leaves the episode untouched.
        assert!(engine.state().alert_sent());
        engine.start_monitoring();
        assert!(!engine.state().alert_sent());
        assert_eq!(shows(&run_for(&mut engine, THRESHOLD + Duration::from_secs(5)).await), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_with_closed_value_has_no_episode() {
        let mut engine = engine();
        engine.on_reading_received("1");
        engine.start_monitoring();
        assert!(engine.state().open_since().is_none());
        assert!(run_for(&mut engine, THRESHOLD * 2).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_pending_when_not_monitoring() {
        let mut engine = engine();
        let result = time::timeout(Duration::from_secs(60), engine.tick()).await;
        assert!(result.is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn raw_value() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("0".to_string()),
                Just("1".to_string()),
                Just(" 0\n".to_string()),
                "[a-z2-9]{0,2}",
            ]
        }

        proptest! {
            /// Over any sequence of readings and clock steps: the alert
            /// invariant holds, at most one alert fires per episode, and a
            /// hide is emitted exactly on a change to a non-open value.
            #[test]
            fn episode_invariants(
                steps in proptest::collection::vec((raw_value(), 0u64..400), 1..40)
            ) {
                let encoding = ValueEncoding::default();
                let base = Instant::now();
                let mut elapsed = 0u64;
                let mut state = MonitorState::default();
                let mut shows_this_episode = 0;

                for (raw, advance) in steps {
                    elapsed += advance;
                    let now = base + Duration::from_secs(elapsed);
                    let changed = raw.trim() != state.last_value();

                    let (next, hide) = state.on_reading(&raw, &encoding, now);
                    let is_open = encoding.classify(next.last_value()).is_open();
                    prop_assert_eq!(hide.is_some(), changed && !is_open);
                    if hide.is_some() {
                        shows_this_episode = 0;
                    }

                    let (next, show) = next.check(&encoding, THRESHOLD, now);
                    if show.is_some() {
                        shows_this_episode += 1;
                    }
                    prop_assert!(shows_this_episode <= 1);
                    prop_assert!(!next.alert_sent() || next.open_since().is_some());
                    prop_assert_eq!(next.open_since().is_some(), is_open);
                    state = next;
                }
            }
        }
    }
}
