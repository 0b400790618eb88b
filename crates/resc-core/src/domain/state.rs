//! Worker state machine.

use super::outcome::Outcome;
use super::reference::TaskRef;

/// State of one worker loop.
///
/// Transitions:
/// - Recovering -> Listening (taken queue drained)
/// - Listening -> Listening (reserve timed out)
/// - Listening -> Reserved -> Executing -> Acknowledging -> Listening
/// - Executing -> Listening (invalid reference, reservation left in place)
/// - Executing -> Quarantining -> Listening (invalid reference, invalid
///   queue configured)
///
/// There is no terminal state. Every state carrying a reference owns it:
/// the reference is in the taken queue for the whole Reserved..Acknowledging
/// span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Moving orphaned references from the taken queue back to input.
    Recovering,

    /// Waiting on the input queue.
    Listening,

    /// Reference moved to the taken queue; pending set not yet released.
    Reserved(TaskRef),

    /// Ready to parse and run the task body.
    Executing(TaskRef),

    /// Task body returned. `published` records whether the reference has
    /// already been pushed to the output queue, so a retried step only
    /// clears the reservation.
    Acknowledging {
        reference: TaskRef,
        outcome: Outcome,
        published: bool,
    },

    /// Reference failed to parse and is being moved to the invalid queue.
    /// `pushed` plays the same role as in `Acknowledging`.
    Quarantining { reference: TaskRef, pushed: bool },
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Recovering => "recovering",
            WorkerState::Listening => "listening",
            WorkerState::Reserved(_) => "reserved",
            WorkerState::Executing(_) => "executing",
            WorkerState::Acknowledging { .. } => "acknowledging",
            WorkerState::Quarantining { .. } => "quarantining",
        }
    }

    /// The reference owned by this state, if any.
    pub fn reference(&self) -> Option<&TaskRef> {
        match self {
            WorkerState::Recovering | WorkerState::Listening => None,
            WorkerState::Reserved(r) | WorkerState::Executing(r) => Some(r),
            WorkerState::Acknowledging { reference, .. }
            | WorkerState::Quarantining { reference, .. } => Some(reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_in_flight_states_own_a_reference() {
        let r = TaskRef::new("trt/plantA/valve1");
        assert_eq!(WorkerState::Recovering.reference(), None);
        assert_eq!(WorkerState::Listening.reference(), None);
        assert_eq!(WorkerState::Reserved(r.clone()).reference(), Some(&r));
        let ack = WorkerState::Acknowledging {
            reference: r.clone(),
            outcome: Outcome::success(),
            published: false,
        };
        assert_eq!(ack.reference(), Some(&r));
        assert_eq!(ack.name(), "acknowledging");
        let quarantine = WorkerState::Quarantining {
            reference: r.clone(),
            pushed: true,
        };
        assert_eq!(quarantine.reference(), Some(&r));
    }
}
