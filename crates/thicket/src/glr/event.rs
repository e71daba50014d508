//! Engine events for debugging and tracing

use super::stack::BranchId;
use crate::table::{RuleId, StateId, TokenId};
use std::sync::{Arc, Mutex, PoisonError};

/// A step taken by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlrEvent {
    /// A branch pushed the lookahead
    Shift {
        branch: BranchId,
        from: StateId,
        to: StateId,
        token: TokenId,
    },
    /// A branch reduced by a rule and resumed through the goto table
    Reduce {
        branch: BranchId,
        rule: RuleId,
        resumed: StateId,
        to: StateId,
    },
    /// A branch hit a conflict entry and was replaced by one child per alternative
    Fork {
        branch: BranchId,
        state: StateId,
        token: TokenId,
        children: Vec<BranchId>,
    },
    /// A branch had no action while others survived
    Prune {
        branch: BranchId,
        state: StateId,
        token: TokenId,
    },
    /// A branch reached accept
    Accept { branch: BranchId, token: TokenId },
    /// The last live branch had no action
    SyntaxError { state: StateId, token: TokenId },
}

/// Trait for receiving engine events
pub trait GlrEventHandler: Send {
    /// Handle an engine event
    fn handle(&mut self, event: GlrEvent);
}

/// A no-op event handler
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventHandler;

impl GlrEventHandler for NullEventHandler {
    fn handle(&mut self, _event: GlrEvent) {}
}

/// Handler that records every event.
///
/// Clones share one log, so a clone can be installed in a parser while the
/// original is kept for inspection.
///
/// ```
/// use thicket::glr::{EventLog, GlrEvent, GlrEventHandler};
///
/// let log = EventLog::new();
/// let mut handler = log.clone();
/// handler.handle(GlrEvent::Accept { branch: Default::default(), token: 0 });
/// assert_eq!(log.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GlrEvent>>>,
}

impl EventLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    #[must_use]
    pub fn events(&self) -> Vec<GlrEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return the recorded events
    pub fn drain(&self) -> Vec<GlrEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl GlrEventHandler for EventLog {
    fn handle(&mut self, event: GlrEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
