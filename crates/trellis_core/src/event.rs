//! Execution events: the append-only log of lifecycle transitions.
//!
//! The engine reports through an [`EventSink`]. [`EventRecorder`] is the in-memory sink used to verify engine
//! behavior: it appends, answers queries by kind, folds counters, and checks that a finished log is well formed.

use std::collections::HashMap;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::descriptor::{DescriptorKind, TestDescriptor};
use crate::unique_id::UniqueId;

/// Lifecycle transition of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    Skipped,
    Aborted,
    Succeeded,
    Failed,
}

impl EventKind {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EventKind::Started)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Started => "started",
            EventKind::Skipped => "skipped",
            EventKind::Aborted => "aborted",
            EventKind::Succeeded => "succeeded",
            EventKind::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Failure detail or skip reason carried by a terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    /// Diagnostic code of the error that ended the node, e.g. `trellis::parameter::ambiguous`.
    pub code: Option<String>,
    pub message: String,
}

impl EventPayload {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Build a payload from any diagnostic, keeping its code.
    pub fn from_diagnostic(error: &dyn Diagnostic) -> Self {
        Self {
            code: error.code().map(|c| c.to_string()),
            message: error.to_string(),
        }
    }
}

/// One immutable entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEvent {
    /// Emission order, starting at 0.
    pub sequence: u64,
    pub unique_id: UniqueId,
    pub display_name: String,
    pub descriptor_kind: DescriptorKind,
    pub kind: EventKind,
    pub payload: Option<EventPayload>,
}

/// Receiver of lifecycle transitions emitted by the engine.
pub trait EventSink {
    fn record(&mut self, descriptor: &TestDescriptor, kind: EventKind, payload: Option<EventPayload>);
}

/// Pure fold of an event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
}

impl EventCounts {
    pub fn terminated(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.aborted
    }

    /// `started == succeeded + failed + skipped + aborted`
    pub fn is_balanced(&self) -> bool {
        self.started == self.terminated()
    }

    pub fn count(&mut self, kind: EventKind) {
        match kind {
            EventKind::Started => self.started += 1,
            EventKind::Succeeded => self.succeeded += 1,
            EventKind::Failed => self.failed += 1,
            EventKind::Skipped => self.skipped += 1,
            EventKind::Aborted => self.aborted += 1,
        }
    }

    fn fold<'a>(events: impl Iterator<Item = &'a ExecutionEvent>) -> Self {
        events.fold(Self::default(), |mut acc, e| {
            acc.count(e.kind);
            acc
        })
    }
}

/// Ways a recorded log can break the event model.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum EventLogViolation {
    #[error("{0} started more than once")]
    #[diagnostic(code(trellis::events::started_twice))]
    StartedTwice(UniqueId),

    #[error("{0} reported a terminal event without being started")]
    #[diagnostic(code(trellis::events::not_started))]
    TerminalBeforeStart(UniqueId),

    #[error("{0} reported more than one terminal event")]
    #[diagnostic(code(trellis::events::terminated_twice))]
    TerminatedTwice(UniqueId),

    #[error("{0} was started but never terminated")]
    #[diagnostic(code(trellis::events::unterminated))]
    Unterminated(UniqueId),

    #[error("container {container} terminated before its descendant {descendant}")]
    #[diagnostic(code(trellis::events::container_before_child))]
    ContainerBeforeChild { container: UniqueId, descendant: UniqueId },
}

/// In-memory, append-only [`EventSink`].
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<ExecutionEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &ExecutionEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Events for test descriptors only (containers and the engine root excluded).
    pub fn test_events(&self) -> impl Iterator<Item = &ExecutionEvent> {
        self.events.iter().filter(|e| e.descriptor_kind.is_test())
    }

    pub fn failed_test_events(&self) -> Vec<&ExecutionEvent> {
        self.test_events().filter(|e| e.kind == EventKind::Failed).collect()
    }

    /// Counters over every event, containers included.
    pub fn counts(&self) -> EventCounts {
        EventCounts::fold(self.events.iter())
    }

    /// Counters over test events only.
    pub fn test_counts(&self) -> EventCounts {
        EventCounts::fold(self.test_events())
    }

    pub fn test_started_count(&self) -> usize {
        self.test_counts().started
    }

    pub fn test_successful_count(&self) -> usize {
        self.test_counts().succeeded
    }

    pub fn test_failed_count(&self) -> usize {
        self.test_counts().failed
    }

    pub fn test_skipped_count(&self) -> usize {
        self.test_counts().skipped
    }

    pub fn test_aborted_count(&self) -> usize {
        self.test_counts().aborted
    }

    /// Terminal event recorded for `unique_id`, if any.
    pub fn terminal_event(&self, unique_id: &UniqueId) -> Option<&ExecutionEvent> {
        self.events
            .iter()
            .find(|e| e.kind.is_terminal() && &e.unique_id == unique_id)
    }

    /// Check the log of a finished run.
    ///
    /// Every node is started once and terminated once after it started, and no container terminates before a
    /// descendant does.
    pub fn verify(&self) -> Result<(), EventLogViolation> {
        let mut started: HashMap<&UniqueId, u64> = HashMap::new();
        let mut terminated: HashMap<&UniqueId, u64> = HashMap::new();

        for event in &self.events {
            let id = &event.unique_id;
            if event.kind == EventKind::Started {
                if started.insert(id, event.sequence).is_some() {
                    return Err(EventLogViolation::StartedTwice(id.clone()));
                }
            } else {
                if !started.contains_key(id) {
                    return Err(EventLogViolation::TerminalBeforeStart(id.clone()));
                }
                if terminated.insert(id, event.sequence).is_some() {
                    return Err(EventLogViolation::TerminatedTwice(id.clone()));
                }
            }
        }

        if let Some(id) = started.keys().find(|id| !terminated.contains_key(*id)) {
            return Err(EventLogViolation::Unterminated((*id).clone()));
        }

        for (descendant, descendant_end) in &terminated {
            for (container, container_end) in &terminated {
                if descendant.is_descendant_of(container) && container_end < descendant_end {
                    return Err(EventLogViolation::ContainerBeforeChild {
                        container: (*container).clone(),
                        descendant: (*descendant).clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl EventSink for EventRecorder {
    fn record(&mut self, descriptor: &TestDescriptor, kind: EventKind, payload: Option<EventPayload>) {
        let sequence = self.events.len() as u64;
        tracing::trace!(sequence, unique_id = %descriptor.unique_id(), %kind, "event");
        self.events.push(ExecutionEvent {
            sequence,
            unique_id: descriptor.unique_id().clone(),
            display_name: descriptor.display_name().to_string(),
            descriptor_kind: descriptor.kind(),
            kind,
            payload,
        });
    }
}
