//! Proof obligations and the queue that orders them.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pdrkit_cfa::LocationId;
use pdrkit_smt::terms::SmtTerm;

/// "Show that `state` cannot reach the error from `location` within
/// `frame_level` steps."
///
/// `cause` links to the obligation whose blocking attempt produced this one,
/// so the chain of a failed obligation is a path towards the error. Equality
/// and hashing cover the whole chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProofObligation {
    frame_level: usize,
    location: LocationId,
    state: SmtTerm,
    cause: Option<Arc<ProofObligation>>,
}

impl ProofObligation {
    pub fn new(frame_level: usize, location: LocationId, state: SmtTerm) -> Self {
        Self {
            frame_level,
            location,
            state,
            cause: None,
        }
    }

    pub fn with_cause(
        frame_level: usize,
        location: LocationId,
        state: SmtTerm,
        cause: Arc<ProofObligation>,
    ) -> Self {
        Self {
            frame_level,
            location,
            state,
            cause: Some(cause),
        }
    }

    pub fn frame_level(&self) -> usize {
        self.frame_level
    }

    pub fn location(&self) -> LocationId {
        self.location
    }

    pub fn state(&self) -> &SmtTerm {
        &self.state
    }

    pub fn cause(&self) -> Option<&ProofObligation> {
        self.cause.as_deref()
    }

    /// Number of obligations behind this one in the chain.
    pub fn cause_depth(&self) -> usize {
        self.chain().count() - 1
    }

    /// This obligation followed by its causes.
    pub fn chain(&self) -> impl Iterator<Item = &ProofObligation> + '_ {
        std::iter::successors(Some(self), |ob| ob.cause())
    }
}

/// Comparator for [`ObligationQueue`]; `Less` dequeues first.
pub trait ObligationOrder {
    fn compare(&self, a: &ProofObligation, b: &ProofObligation) -> Ordering;
}

/// Built-in obligation orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationPriority {
    /// Lowest frame level first.
    #[default]
    FrameLevel,
    /// Lowest frame level first; among equal levels, the deeper cause chain.
    FrameLevelDeepestFirst,
}

impl ObligationOrder for ObligationPriority {
    fn compare(&self, a: &ProofObligation, b: &ProofObligation) -> Ordering {
        let by_level = a.frame_level.cmp(&b.frame_level);
        match self {
            ObligationPriority::FrameLevel => by_level,
            ObligationPriority::FrameLevelDeepestFirst => {
                by_level.then_with(|| b.cause_depth().cmp(&a.cause_depth()))
            }
        }
    }
}

/// Min-priority queue of obligations. Ties leave in insertion order.
#[derive(Debug, Clone)]
pub struct ObligationQueue<O: ObligationOrder = ObligationPriority> {
    order: O,
    items: VecDeque<ProofObligation>,
}

impl<O: ObligationOrder> ObligationQueue<O> {
    pub fn new(order: O) -> Self {
        Self {
            order,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, obligation: ProofObligation) {
        let idx = self
            .items
            .partition_point(|queued| self.order.compare(queued, &obligation) != Ordering::Greater);
        self.items.insert(idx, obligation);
    }

    pub fn pop(&mut self) -> Option<ProofObligation> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&ProofObligation> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ObligationQueue<ObligationPriority> {
    fn default() -> Self {
        Self::new(ObligationPriority::default())
    }
}
