//! Consumer verdicts and the two-phase aggregation pipeline.
//!
//! Every registered consumer answers each event with a [`Verdict`].  The
//! pipeline combines them:
//!
//! 1. **Evaluate** – the caller collects one verdict per consumer, in
//!    registration order.  [`run`] only starts once all of them exist.
//! 2. **Aggregate** – the decision is [`Decision::Forward`] iff every verdict
//!    succeeded.
//! 3. **Notify** – each rejected verdict that carries a rejection handler has
//!    it called exactly once with the identities of *all* rejecting
//!    consumers, so a consumer can tell whether it caused the swallow itself.

use std::fmt;

/// The role a consumer plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerKind {
    /// Substitutes one key for another.
    Binder,
    /// Swallows selected events.
    Blocker,
    /// Observes events; may veto through its handler's return value.
    Listener,
    Custom,
}

/// Who produced a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerIdentity {
    pub name: String,
    pub kind: ConsumerKind,
}

impl ConsumerIdentity {
    pub fn new(name: impl Into<String>, kind: ConsumerKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.kind)
    }
}

/// Continuation run during the notification phase of a swallowed event.
///
/// Receives every rejecting consumer's identity for that event.
pub type RejectionHandler = Box<dyn FnOnce(&[ConsumerIdentity]) + Send>;

/// One consumer's answer for one event.
pub struct Verdict {
    pub succeeded: bool,
    pub identity: ConsumerIdentity,
    pub on_rejected: Option<RejectionHandler>,
}

impl Verdict {
    /// Lets the event through.
    pub fn accept(identity: ConsumerIdentity) -> Self {
        Self {
            succeeded: true,
            identity,
            on_rejected: None,
        }
    }

    /// Vetoes the event.
    pub fn reject(identity: ConsumerIdentity) -> Self {
        Self {
            succeeded: false,
            identity,
            on_rejected: None,
        }
    }

    pub fn from_bool(succeeded: bool, identity: ConsumerIdentity) -> Self {
        Self {
            succeeded,
            identity,
            on_rejected: None,
        }
    }

    /// Attaches a continuation.  It only runs if this verdict is a rejection.
    pub fn on_rejected<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&[ConsumerIdentity]) + Send + 'static,
    {
        self.on_rejected = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verdict")
            .field("succeeded", &self.succeeded)
            .field("identity", &self.identity)
            .field("on_rejected", &self.on_rejected.is_some())
            .finish()
    }
}

/// The combined outcome for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass the event to the next hook and on to its target window.
    Forward,
    /// Stop propagation; nothing downstream sees the event.
    Swallow,
}

impl Decision {
    pub fn is_forward(self) -> bool {
        self == Decision::Forward
    }
}

/// Aggregates a complete set of verdicts and runs the notification phase.
pub fn run(verdicts: Vec<Verdict>) -> Decision {
    let mut rejected = Vec::new();
    let mut handlers = Vec::new();

    for verdict in verdicts {
        if verdict.succeeded {
            continue;
        }
        rejected.push(verdict.identity);
        if let Some(handler) = verdict.on_rejected {
            handlers.push(handler);
        }
    }

    if rejected.is_empty() {
        return Decision::Forward;
    }

    for handler in handlers {
        handler(&rejected);
    }
    Decision::Swallow
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn id(name: &str) -> ConsumerIdentity {
        ConsumerIdentity::new(name, ConsumerKind::Custom)
    }

    #[test]
    fn test_run_with_no_verdicts_forwards() {
        assert_eq!(run(Vec::new()), Decision::Forward);
    }

    #[test]
    fn test_run_all_succeeded_forwards_and_skips_handlers() {
        // Arrange
        let calls = Arc::new(Mutex::new(0));
        let c = Arc::clone(&calls);
        let verdicts = vec![
            Verdict::accept(id("a")).on_rejected(move |_| *c.lock().unwrap() += 1),
            Verdict::accept(id("b")),
        ];

        // Act
        let decision = run(verdicts);

        // Assert
        assert_eq!(decision, Decision::Forward);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_run_single_failure_swallows_and_notifies_only_failing_consumer() {
        // Arrange: [success, failure, success]
        let seen: Arc<Mutex<Vec<Vec<ConsumerIdentity>>>> = Arc::default();
        let (s1, s2, s3) = (Arc::clone(&seen), Arc::clone(&seen), Arc::clone(&seen));
        let verdicts = vec![
            Verdict::accept(id("first")).on_rejected(move |r| s1.lock().unwrap().push(r.to_vec())),
            Verdict::reject(id("second")).on_rejected(move |r| s2.lock().unwrap().push(r.to_vec())),
            Verdict::accept(id("third")).on_rejected(move |r| s3.lock().unwrap().push(r.to_vec())),
        ];

        // Act
        let decision = run(verdicts);

        // Assert
        assert_eq!(decision, Decision::Swallow);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "only the failing consumer is notified");
        assert_eq!(seen[0], vec![id("second")]);
    }

    #[test]
    fn test_run_passes_complete_rejected_set_to_every_handler() {
        // Arrange
        let seen: Arc<Mutex<Vec<Vec<ConsumerIdentity>>>> = Arc::default();
        let (s1, s2) = (Arc::clone(&seen), Arc::clone(&seen));
        let verdicts = vec![
            Verdict::reject(id("x")).on_rejected(move |r| s1.lock().unwrap().push(r.to_vec())),
            Verdict::reject(id("y")),
            Verdict::reject(id("z")).on_rejected(move |r| s2.lock().unwrap().push(r.to_vec())),
        ];

        // Act
        run(verdicts);

        // Assert
        let seen = seen.lock().unwrap();
        let expected = vec![id("x"), id("y"), id("z")];
        assert_eq!(*seen, vec![expected.clone(), expected]);
    }

    #[test]
    fn test_rejection_without_handler_still_swallows() {
        assert_eq!(run(vec![Verdict::reject(id("quiet"))]), Decision::Swallow);
    }

    #[test]
    fn test_verdict_debug_hides_closure() {
        let v = Verdict::reject(id("dbg")).on_rejected(|_| {});
        let text = format!("{v:?}");
        assert!(text.contains("on_rejected: true"));
    }
}
