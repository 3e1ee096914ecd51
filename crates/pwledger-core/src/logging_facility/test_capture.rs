//! In-memory capture of log events for deterministic assertions
//!
//! `init_test_capture()` installs a recording layer as the global subscriber
//! once per test binary. Every test gets the same handle, so assertions
//! should select events by `op` (and a unique field value where tests share
//! an op).

use pwledger_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_COMPONENT, FIELD_ERR_CODE, FIELD_EVENT, FIELD_OP,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One recorded event, fields rendered as strings
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    /// `start`, `end` or `end_error` for boundary events
    pub fn event(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    pub fn component(&self) -> Option<&str> {
        self.field(FIELD_COMPONENT)
    }

    pub fn is(&self, op: &str, event: &str) -> bool {
        self.op() == Some(op) && self.event() == Some(event)
    }
}

/// How one invocation of an operation resolved, read from its boundary events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// `start` with no matching end yet
    Started,
    Succeeded,
    Failed { err_code: String },
}

#[derive(Default)]
struct FieldRecorder(BTreeMap<String, String>);

impl FieldRecorder {
    fn put(&mut self, field: &Field, value: String) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldRecorder {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }
}

/// Layer appending every event to a shared buffer
pub struct CaptureLayer {
    buffer: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn new() -> (Self, TestCapture) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                buffer: Arc::clone(&buffer),
            },
            TestCapture { buffer },
        )
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut recorder = FieldRecorder::default();
        event.record(&mut recorder);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            fields: recorder.0,
        };
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(captured);
        }
    }
}

/// Read side of the capture buffer
#[derive(Clone)]
pub struct TestCapture {
    buffer: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Events carrying `op`, in emission order
    pub fn events_for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.op() == Some(op))
            .collect()
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Resolution of each invocation of `op`, oldest first
    ///
    /// Pairs each `end`/`end_error` with the most recent unresolved `start`.
    pub fn outcomes(&self, op: &str) -> Vec<OpOutcome> {
        let mut outcomes = Vec::new();
        for event in self.events_for_op(op) {
            let resolved = match event.event() {
                Some(EVENT_START) => {
                    outcomes.push(OpOutcome::Started);
                    continue;
                }
                Some(EVENT_END) => OpOutcome::Succeeded,
                Some(EVENT_END_ERROR) => OpOutcome::Failed {
                    err_code: event.field(FIELD_ERR_CODE).unwrap_or_default().to_string(),
                },
                _ => continue,
            };
            match outcomes.iter_mut().rev().find(|o| **o == OpOutcome::Started) {
                Some(slot) => *slot = resolved,
                None => outcomes.push(resolved),
            }
        }
        outcomes
    }

    /// # Panics
    ///
    /// If no event has this `op` and `event`.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no {} event for op {} among {} captured events",
            event,
            op,
            events.len()
        );
    }

    /// # Panics
    ///
    /// Unless some invocation of `op` ended with `err_code`.
    pub fn assert_op_failed(&self, op: &str, err_code: &str) {
        let outcomes = self.outcomes(op);
        assert!(
            outcomes.contains(&OpOutcome::Failed {
                err_code: err_code.to_string()
            }),
            "op {} never failed with {}; outcomes: {:?}",
            op,
            err_code,
            outcomes
        );
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer (first call only) and return the shared handle
///
/// Do not mix with `init()` in the same test binary: only one global
/// subscriber can be installed.
///
/// ```
/// use pwledger_core::logging_facility::test_capture::init_test_capture;
/// use pwledger_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_capture_op");
/// capture.assert_event_exists("doc_capture_op", "start");
/// ```
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let (layer, capture) = CaptureLayer::new();
            tracing_subscriber::registry().with(layer).init();
            capture
        })
        .clone()
}
