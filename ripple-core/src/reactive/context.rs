//! Active-Computation Stack
//!
//! The stack records which computation is currently evaluating. This enables
//! automatic dependency tracking: when a cell is read, the runtime subscribes
//! whatever computation sits on top of the stack.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns one stack. When a computation starts evaluating we
//! push a frame, and when it completes we pop it. Scoping is dynamic, not
//! lexical: a computation that constructs another computation while running
//! sees the inner one on top until its construction finishes, after which the
//! outer frame is current again.
//!
//! Frames are popped by [`EvaluationScope`]'s `Drop`, so the stack stays
//! balanced even if a producer panics.

use smallvec::SmallVec;

use super::runtime::Runtime;
use super::ComputationId;

/// One entry on the active stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A computation is evaluating. Reads attribute to it when `tracking`.
    Computation { id: ComputationId, tracking: bool },
    /// Tracking is suspended, see [`Runtime::untracked`].
    Untracked,
}

/// Ordered sequence of evaluating computations.
#[derive(Debug, Default)]
pub(crate) struct ActiveStack {
    frames: SmallVec<[Frame; 8]>,
}

impl ActiveStack {
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self, expected: Frame) {
        let popped = self.frames.pop();

        // Catches scopes dropped out of order.
        debug_assert_eq!(
            popped,
            Some(expected),
            "active stack mismatch: expected {:?}, got {:?}",
            expected,
            popped
        );
    }

    /// The computation that should receive tracked reads right now, if any.
    pub(crate) fn tracking_target(&self) -> Option<ComputationId> {
        match self.frames.last() {
            Some(Frame::Computation { id, tracking: true }) => Some(*id),
            _ => None,
        }
    }

    /// The innermost evaluating computation, regardless of its tracking flag
    /// and of any `Untracked` frames above it.
    pub(crate) fn current(&self) -> Option<ComputationId> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Computation { id, .. } => Some(*id),
            Frame::Untracked => None,
        })
    }

    /// Whether `id` is evaluating anywhere on the stack.
    pub(crate) fn contains(&self, id: ComputationId) -> bool {
        self.frames
            .iter()
            .any(|frame| matches!(frame, Frame::Computation { id: f, .. } if *f == id))
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Guard that pops its frame when dropped.
pub(crate) struct EvaluationScope<'a> {
    runtime: &'a Runtime,
    frame: Frame,
}

impl<'a> EvaluationScope<'a> {
    /// Push `frame` onto `runtime`'s stack until the guard is dropped.
    pub(crate) fn enter(runtime: &'a Runtime, frame: Frame) -> Self {
        runtime.with_state(|state| state.stack.push(frame));
        Self { runtime, frame }
    }
}

impl Drop for EvaluationScope<'_> {
    fn drop(&mut self) {
        let frame = self.frame;
        self.runtime.with_state(|state| state.stack.pop(frame));
    }
}
