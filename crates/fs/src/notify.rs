// Change notifications: coalesce per-path events within a time window and
// publish each flushed window as one batch.
//
// Window defaults to 100ms, clamped to 50–500ms. Within a window repeated
// events for a path collapse; a `Created` followed by `Changed` stays
// `Created`, otherwise the last kind wins.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use creatio_fs_common::path::VirtualPath;

/// Default coalescing window.
const DEFAULT_DEBOUNCE_MS: u64 = 100;
/// Minimum allowed coalescing window.
const MIN_DEBOUNCE_MS: u64 = 50;
/// Maximum allowed coalescing window.
const MAX_DEBOUNCE_MS: u64 = 500;
/// Batches buffered per subscriber before it starts lagging.
const BATCH_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: VirtualPath,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: VirtualPath) -> Self {
        Self { kind, path }
    }
}

/// Configuration for the coalescer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    pub window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { window: Duration::from_millis(DEFAULT_DEBOUNCE_MS) }
    }
}

impl DebounceConfig {
    /// Create a config with the given window in milliseconds, clamped to [50, 500].
    pub fn with_millis(ms: u64) -> Self {
        let clamped = ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
        Self { window: Duration::from_millis(clamped) }
    }
}

// ── Coalescer ──────────────────────────────────────────────────────

/// Buffers events for one window at a time.
///
/// The first event pushed into an empty buffer opens the window; once it has
/// elapsed, `drain_ready_at` hands back everything buffered, in first-seen
/// order.
pub struct Coalescer {
    config: DebounceConfig,
    pending: Vec<ChangeEvent>,
    positions: HashMap<VirtualPath, usize>,
    opened_at: Option<Instant>,
}

impl Coalescer {
    pub fn new(config: DebounceConfig) -> Self {
        Self { config, pending: Vec::new(), positions: HashMap::new(), opened_at: None }
    }

    pub fn push(&mut self, event: ChangeEvent) {
        self.push_at(event, Instant::now());
    }

    /// Like `push` but with a specific timestamp (for testing).
    fn push_at(&mut self, event: ChangeEvent, now: Instant) {
        self.opened_at.get_or_insert(now);
        match self.positions.get(&event.path) {
            Some(&index) => {
                let existing = &mut self.pending[index];
                existing.kind = merge(existing.kind, event.kind);
            }
            None => {
                self.positions.insert(event.path.clone(), self.pending.len());
                self.pending.push(event);
            }
        }
    }

    pub fn drain_ready(&mut self) -> Option<Vec<ChangeEvent>> {
        self.drain_ready_at(Instant::now())
    }

    /// Like `drain_ready` but with a specific timestamp (for testing).
    fn drain_ready_at(&mut self, now: Instant) -> Option<Vec<ChangeEvent>> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        Some(self.flush())
    }

    /// Take everything buffered regardless of the window.
    pub fn flush(&mut self) -> Vec<ChangeEvent> {
        self.opened_at = None;
        self.positions.clear();
        std::mem::take(&mut self.pending)
    }

    /// Number of distinct paths waiting in the current window.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// When the current window closes, or None if nothing is buffered.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.opened_at.map(|opened| opened + self.config.window)
    }
}

fn merge(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (previous, next) {
        (ChangeKind::Created, ChangeKind::Changed) => ChangeKind::Created,
        (_, next) => next,
    }
}

// ── Notifier ───────────────────────────────────────────────────────

/// Accepts individual events and publishes coalesced batches to every
/// subscriber. The pump task exits when the notifier is dropped.
pub struct ChangeNotifier {
    events: mpsc::UnboundedSender<ChangeEvent>,
    batches: broadcast::Sender<Vec<ChangeEvent>>,
}

impl ChangeNotifier {
    /// Start the pump on the current tokio runtime.
    pub fn spawn(config: DebounceConfig) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let (batches, _) = broadcast::channel(BATCH_CHANNEL_CAPACITY);
        tokio::spawn(run_pump(rx, batches.clone(), config));
        Self { events, batches }
    }

    pub fn emit(&self, kind: ChangeKind, path: VirtualPath) {
        trace!(?kind, %path, "change queued");
        if self.events.send(ChangeEvent::new(kind, path)).is_err() {
            debug!("change pump stopped, dropping event");
        }
    }

    /// Subscribe to batches, optionally only for paths under `prefix`.
    pub fn subscribe(&self, prefix: Option<VirtualPath>) -> ChangeSubscription {
        ChangeSubscription { rx: self.batches.subscribe(), prefix }
    }
}

async fn run_pump(
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    batches: broadcast::Sender<Vec<ChangeEvent>>,
    config: DebounceConfig,
) {
    let mut coalescer = Coalescer::new(config);
    loop {
        let deadline = coalescer.next_deadline();
        tokio::select! {
            maybe_event = rx.recv() => match maybe_event {
                Some(event) => coalescer.push(event),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
        }

        if let Some(batch) = coalescer.drain_ready() {
            publish(&batches, batch);
        }
    }

    let rest = coalescer.flush();
    if !rest.is_empty() {
        publish(&batches, rest);
    }
}

fn publish(batches: &broadcast::Sender<Vec<ChangeEvent>>, batch: Vec<ChangeEvent>) {
    debug!(events = batch.len(), "publishing change batch");
    // No subscribers is fine.
    let _ = batches.send(batch);
}

/// Receiving half of a subscription.
pub struct ChangeSubscription {
    rx: broadcast::Receiver<Vec<ChangeEvent>>,
    prefix: Option<VirtualPath>,
}

impl ChangeSubscription {
    /// Next non-empty batch matching the prefix, or None once the notifier
    /// is gone.
    pub async fn recv(&mut self) -> Option<Vec<ChangeEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(batch) => {
                    let batch: Vec<ChangeEvent> = match &self.prefix {
                        Some(prefix) => {
                            batch.into_iter().filter(|event| event.path.starts_with(prefix)).collect()
                        }
                        None => batch,
                    };
                    if !batch.is_empty() {
                        return Some(batch);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscriber lagged, batches dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> VirtualPath {
        VirtualPath::parse(raw).unwrap()
    }

    fn event(kind: ChangeKind, raw: &str) -> ChangeEvent {
        ChangeEvent::new(kind, path(raw))
    }

    // ── DebounceConfig ─────────────────────────────────────────────

    #[test]
    fn default_config_is_100ms() {
        assert_eq!(DebounceConfig::default().window, Duration::from_millis(100));
    }

    #[test]
    fn config_clamps_to_range() {
        assert_eq!(DebounceConfig::with_millis(10).window, Duration::from_millis(50));
        assert_eq!(DebounceConfig::with_millis(1000).window, Duration::from_millis(500));
        assert_eq!(DebounceConfig::with_millis(200).window, Duration::from_millis(200));
    }

    // ── Coalescer ──────────────────────────────────────────────────

    #[test]
    fn nothing_ready_before_window_closes() {
        let mut coalescer = Coalescer::new(DebounceConfig::default());
        let now = Instant::now();
        coalescer.push_at(event(ChangeKind::Changed, "creatio:/h/Custom/A.js"), now);

        assert!(coalescer.drain_ready_at(now + Duration::from_millis(50)).is_none());
        assert_eq!(coalescer.pending_count(), 1);
    }

    #[test]
    fn window_is_flushed_as_one_batch_in_first_seen_order() {
        let mut coalescer = Coalescer::new(DebounceConfig::default());
        let now = Instant::now();
        coalescer.push_at(event(ChangeKind::Changed, "creatio:/h/Custom/B.js"), now);
        coalescer
            .push_at(event(ChangeKind::Changed, "creatio:/h/Custom/A.js"), now + Duration::from_millis(90));

        let batch = coalescer.drain_ready_at(now + Duration::from_millis(100)).unwrap();
        let paths: Vec<String> = batch.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["creatio:/h/Custom/B.js", "creatio:/h/Custom/A.js"]);
        assert_eq!(coalescer.pending_count(), 0);
        assert!(coalescer.next_deadline().is_none());
    }

    #[test]
    fn created_then_changed_stays_created() {
        let mut coalescer = Coalescer::new(DebounceConfig::default());
        let now = Instant::now();
        coalescer.push_at(event(ChangeKind::Created, "creatio:/h/Custom/A.js"), now);
        coalescer.push_at(event(ChangeKind::Changed, "creatio:/h/Custom/A.js"), now);

        let batch = coalescer.flush();
        assert_eq!(batch, vec![event(ChangeKind::Created, "creatio:/h/Custom/A.js")]);
    }

    #[test]
    fn otherwise_last_kind_wins() {
        let mut coalescer = Coalescer::new(DebounceConfig::default());
        let now = Instant::now();
        coalescer.push_at(event(ChangeKind::Created, "creatio:/h/Custom/A.js"), now);
        coalescer.push_at(event(ChangeKind::Deleted, "creatio:/h/Custom/A.js"), now);
        coalescer.push_at(event(ChangeKind::Changed, "creatio:/h/Custom/B.js"), now);
        coalescer.push_at(event(ChangeKind::Deleted, "creatio:/h/Custom/B.js"), now);

        let batch = coalescer.flush();
        assert_eq!(
            batch,
            vec![
                event(ChangeKind::Deleted, "creatio:/h/Custom/A.js"),
                event(ChangeKind::Deleted, "creatio:/h/Custom/B.js"),
            ]
        );
    }

    #[test]
    fn window_does_not_slide_with_new_events() {
        let mut coalescer = Coalescer::new(DebounceConfig::default());
        let now = Instant::now();
        coalescer.push_at(event(ChangeKind::Changed, "creatio:/h/Custom/A.js"), now);
        coalescer.push_at(event(ChangeKind::Changed, "creatio:/h/Custom/A.js"), now + Duration::from_millis(80));
        assert_eq!(coalescer.next_deadline(), Some(now + Duration::from_millis(100)));
    }

    // ── Notifier ───────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn notifier_publishes_coalesced_batches() {
        let notifier = ChangeNotifier::spawn(DebounceConfig::default());
        let mut subscription = notifier.subscribe(None);

        notifier.emit(ChangeKind::Created, path("creatio:/h/Custom/A.js"));
        notifier.emit(ChangeKind::Changed, path("creatio:/h/Custom/A.js"));
        notifier.emit(ChangeKind::Changed, path("creatio:/h/Custom/B.js"));

        let batch = subscription.recv().await.expect("batch should arrive");
        assert_eq!(
            batch,
            vec![
                event(ChangeKind::Created, "creatio:/h/Custom/A.js"),
                event(ChangeKind::Changed, "creatio:/h/Custom/B.js"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_filters_by_prefix() {
        let notifier = ChangeNotifier::spawn(DebounceConfig::default());
        let mut custom = notifier.subscribe(Some(path("creatio:/h/Custom")));

        notifier.emit(ChangeKind::Changed, path("creatio:/h/Base/X.js"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        notifier.emit(ChangeKind::Changed, path("creatio:/h/Custom/A.js"));

        let batch = custom.recv().await.unwrap();
        assert_eq!(batch, vec![event(ChangeKind::Changed, "creatio:/h/Custom/A.js")]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_notifier_flushes_and_closes() {
        let notifier = ChangeNotifier::spawn(DebounceConfig::with_millis(500));
        let mut subscription = notifier.subscribe(None);
        notifier.emit(ChangeKind::Deleted, path("creatio:/h/Custom/A.js"));
        drop(notifier);

        assert_eq!(
            subscription.recv().await,
            Some(vec![event(ChangeKind::Deleted, "creatio:/h/Custom/A.js")])
        );
        assert_eq!(subscription.recv().await, None);
    }
}
