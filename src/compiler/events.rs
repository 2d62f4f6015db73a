//! Trace of everything a lowering run did.
//!
//! Every inline attempt, removal and diagnostic is recorded as an [`Event`] in an [`EventLog`].
//! The log is the observable output of a run besides the "changed" flag: tests assert on it,
//! and [`LoweringStats`] derives all counters from it instead of tracking them separately.
//!
//! # Example
//!
//! ```rust
//! use phaselower::{compiler::{EventKind, EventLog}, ir::FunctionId};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::FunctionInlined)
//!     .caller(FunctionId::new(2))
//!     .function(FunctionId::new(1))
//!     .phase(1)
//!     .message("inlined mid into top");
//!
//! assert_eq!(log.count_kind(EventKind::FunctionInlined), 1);
//! assert_eq!(log.summary(), "1 function inlined");
//! ```

use std::{collections::HashMap, fmt};

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::ir::FunctionId;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum EventKind {
    /// A call site was replaced by its callee's body.
    FunctionInlined,
    /// A phase function was removed from the module.
    FunctionRemoved,

    /// The inliner refused a call site.
    InlineFailed,
    /// A recorded call site no longer targets the function it was recorded for.
    StaleCallSite,
    /// Functions were left unresolved because of a call cycle.
    CycleDetected,
    /// A protected function carries the phase tag being lowered.
    InvariantViolation,

    /// A lowering pass started.
    PassStarted,
    /// A lowering pass completed.
    PassCompleted,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::FunctionInlined => "function inlined",
            Self::FunctionRemoved => "function removed",
            Self::InlineFailed => "inline failed",
            Self::StaleCallSite => "stale call site",
            Self::CycleDetected => "call cycle detected",
            Self::InvariantViolation => "invariant violation",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
        }
    }

    /// Returns true if this event represents a change to the module.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(self, Self::FunctionInlined | Self::FunctionRemoved)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function the event is about: the inlined callee or the removed function.
    pub function: Option<FunctionId>,
    /// The caller, for events about a call site.
    pub caller: Option<FunctionId>,
    /// The phase being lowered.
    pub phase: Option<u32>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<&'static str>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<FunctionId>,
    caller: Option<FunctionId>,
    phase: Option<u32>,
    message: Option<String>,
    pass: Option<&'static str>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            caller: None,
            phase: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function the event is about.
    pub fn function(mut self, function: FunctionId) -> Self {
        self.function = Some(function);
        self
    }

    /// Sets the caller of the call site the event is about.
    pub fn caller(mut self, caller: FunctionId) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Sets the phase being lowered.
    pub fn phase(mut self, phase: u32) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: &'static str) -> Self {
        self.pass = Some(pass_name);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        let event = Event {
            kind: self.kind,
            function: self.function.take(),
            caller: self.caller.take(),
            phase: self.phase.take(),
            message,
            pass: self.pass.take(),
        };

        self.log.events.push(event);
    }
}

/// Collection of events from a lowering run.
///
/// Append-only; events can be recorded through a shared reference, so passes take `&EventLog`
/// even while they hold the module mutably.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for event in other {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.filter_kind(kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::with_capacity(EventKind::COUNT);
        for event in self {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Summarizes the inlines and removals in the log, kinds in declaration order.
    ///
    /// A log without either reports its event count instead.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();
        let parts: Vec<String> = EventKind::iter()
            .filter(EventKind::is_transformation)
            .filter_map(|kind| {
                counts
                    .get(&kind)
                    .map(|count| format!("{} {}", count, kind.description()))
            })
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.join(", ")
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

/// Statistics derived from an EventLog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoweringStats {
    /// Number of call sites inlined.
    pub inlined: usize,
    /// Number of inline attempts the inliner refused.
    pub inline_failures: usize,
    /// Number of recorded call sites found stale.
    pub stale_call_sites: usize,
    /// Number of functions removed.
    pub removed: usize,
    /// Number of call cycles diagnosed.
    pub cycles: usize,
    /// Number of invariant violations recorded.
    pub invariant_violations: usize,
}

impl LoweringStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            inlined: get(EventKind::FunctionInlined),
            inline_failures: get(EventKind::InlineFailed),
            stale_call_sites: get(EventKind::StaleCallSite),
            removed: get(EventKind::FunctionRemoved),
            cycles: get(EventKind::CycleDetected),
            invariant_violations: get(EventKind::InvariantViolation),
        }
    }

    /// Returns true if the run changed the module.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.inlined > 0 || self.removed > 0
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.inlined > 0 {
            parts.push(format!("{} inlined", self.inlined));
        }
        if self.removed > 0 {
            parts.push(format!("{} removed", self.removed));
        }
        if self.inline_failures > 0 {
            parts.push(format!("{} failed", self.inline_failures));
        }
        if self.cycles > 0 {
            parts.push(format!("{} cycles", self.cycles));
        }

        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for LoweringStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
