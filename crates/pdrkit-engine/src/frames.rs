//! Per-location frame sequences.
//!
//! Frames are delta-encoded: a clause stored at level `i` holds at every
//! level `<= i`, so the clauses in effect at level `i` are the ones stored at
//! `i..=max_level`. Pushing a clause forward moves it from one level to the
//! next without changing the lower frames.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use tracing::debug;

use pdrkit_cfa::LocationId;
use pdrkit_smt::terms::SmtTerm;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame level {level} outside [0, {max}]")]
    LevelOutOfRange { level: usize, max: usize },
}

/// Decides whether clauses may move to the next frame.
pub trait PropagationOracle {
    type Error: From<FrameError>;

    /// Whether `clause`, stored at `(location, level)`, is inductive relative
    /// to the frames at `level` over every transition into `location`.
    fn can_propagate(
        &mut self,
        frames: &dyn FrameSet,
        clause: &SmtTerm,
        location: LocationId,
        level: usize,
    ) -> Result<bool, Self::Error>;

    /// Whether `stronger` implies `weaker`.
    fn subsumes(&mut self, stronger: &SmtTerm, weaker: &SmtTerm) -> Result<bool, Self::Error>;
}

pub trait FrameSet {
    fn entry(&self) -> LocationId;

    fn max_level(&self) -> usize;

    /// Append an empty frame to every known location.
    fn open_next_frame_set(&mut self);

    /// Locations that have a frame sequence.
    fn locations(&self) -> Vec<LocationId>;

    /// Clauses in effect at `(location, level)`. Unseen locations have none.
    fn states_for_location(
        &self,
        location: LocationId,
        level: usize,
    ) -> Result<Vec<SmtTerm>, FrameError>;

    fn states_for_all_locations(
        &self,
        level: usize,
    ) -> Result<IndexMap<LocationId, Vec<SmtTerm>>, FrameError> {
        let mut out = IndexMap::new();
        for location in self.locations() {
            out.insert(location, self.states_for_location(location, level)?);
        }
        Ok(out)
    }

    /// Clauses to assert for `(location, level)` in a query. At level 0 only
    /// the entry is reachable, so other locations get `false`.
    fn constraints(&self, location: LocationId, level: usize) -> Result<Vec<SmtTerm>, FrameError> {
        let mut clauses = self.states_for_location(location, level)?;
        if level == 0 && location != self.entry() {
            clauses.push(SmtTerm::bool(false));
        }
        Ok(clauses)
    }

    /// Store `not state` at `(location, level)`.
    fn block_state(
        &mut self,
        state: &SmtTerm,
        level: usize,
        location: LocationId,
    ) -> Result<(), FrameError>;

    /// Push every clause that stays inductive one level up. Returns the
    /// number of clauses that moved.
    fn propagate<O>(&mut self, oracle: &mut O) -> Result<usize, O::Error>
    where
        O: PropagationOracle,
        Self: Sized;

    /// Lowest level `i >= 1` whose frames equal those at `i + 1` everywhere.
    fn fixpoint_level(&self) -> Option<usize>;
}

/// [`FrameSet`] backed by one list of stored clause sets per location.
#[derive(Debug, Clone)]
pub struct DynamicFrameSet {
    entry: LocationId,
    max_level: usize,
    frames: IndexMap<LocationId, Vec<IndexSet<SmtTerm>>>,
}

impl DynamicFrameSet {
    pub fn new(entry: LocationId) -> Self {
        Self {
            entry,
            max_level: 0,
            frames: IndexMap::new(),
        }
    }

    fn check_level(&self, level: usize) -> Result<(), FrameError> {
        if level > self.max_level {
            return Err(FrameError::LevelOutOfRange {
                level,
                max: self.max_level,
            });
        }
        Ok(())
    }

    /// Clauses stored exactly at `(location, level)`.
    pub fn stored(&self, location: LocationId, level: usize) -> Vec<SmtTerm> {
        self.frames
            .get(&location)
            .and_then(|levels| levels.get(level))
            .map(|frame| frame.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clause_count(&self) -> usize {
        self.frames
            .values()
            .flat_map(|levels| levels.iter())
            .map(IndexSet::len)
            .sum()
    }

    fn frame_mut(&mut self, location: LocationId, level: usize) -> &mut IndexSet<SmtTerm> {
        let depth = self.max_level + 1;
        let levels = self
            .frames
            .entry(location)
            .or_insert_with(|| vec![IndexSet::new(); depth]);
        if levels.len() < depth {
            levels.resize_with(depth, IndexSet::new);
        }
        &mut levels[level]
    }

    fn effective_set(&self, location: LocationId, level: usize) -> HashSet<&SmtTerm> {
        self.frames
            .get(&location)
            .map(|levels| levels.iter().skip(level).flatten().collect())
            .unwrap_or_default()
    }

    fn push_clause<O>(
        &mut self,
        oracle: &mut O,
        clause: SmtTerm,
        location: LocationId,
        level: usize,
    ) -> Result<(), O::Error>
    where
        O: PropagationOracle,
    {
        self.frame_mut(location, level).shift_remove(&clause);
        let next = level + 1;
        for existing in self.states_for_location(location, next)? {
            if oracle.subsumes(&existing, &clause)? {
                return Ok(());
            }
        }
        let mut weaker = Vec::new();
        for existing in self.stored(location, next) {
            if oracle.subsumes(&clause, &existing)? {
                weaker.push(existing);
            }
        }
        let frame = self.frame_mut(location, next);
        for existing in &weaker {
            frame.shift_remove(existing);
        }
        frame.insert(clause);
        Ok(())
    }
}

impl FrameSet for DynamicFrameSet {
    fn entry(&self) -> LocationId {
        self.entry
    }

    fn max_level(&self) -> usize {
        self.max_level
    }

    fn open_next_frame_set(&mut self) {
        self.max_level += 1;
        for levels in self.frames.values_mut() {
            levels.push(IndexSet::new());
        }
    }

    fn locations(&self) -> Vec<LocationId> {
        self.frames.keys().copied().collect()
    }

    fn states_for_location(
        &self,
        location: LocationId,
        level: usize,
    ) -> Result<Vec<SmtTerm>, FrameError> {
        self.check_level(level)?;
        let mut seen = HashSet::new();
        let Some(levels) = self.frames.get(&location) else {
            return Ok(Vec::new());
        };
        Ok(levels
            .iter()
            .skip(level)
            .flatten()
            .filter(|clause| seen.insert(*clause))
            .cloned()
            .collect())
    }

    fn block_state(
        &mut self,
        state: &SmtTerm,
        level: usize,
        location: LocationId,
    ) -> Result<(), FrameError> {
        self.check_level(level)?;
        let clause = state.negate();
        let frame = self.frame_mut(location, level);
        if !clause.is_true() {
            frame.insert(clause);
        }
        Ok(())
    }

    fn propagate<O>(&mut self, oracle: &mut O) -> Result<usize, O::Error>
    where
        O: PropagationOracle,
    {
        let mut pushed = 0;
        for level in 1..self.max_level {
            for location in self.locations() {
                for clause in self.stored(location, level) {
                    if oracle.can_propagate(&*self, &clause, location, level)? {
                        self.push_clause(oracle, clause, location, level)?;
                        pushed += 1;
                    }
                }
            }
            debug!(level, pushed, "PDR: propagated frame");
        }
        Ok(pushed)
    }

    fn fixpoint_level(&self) -> Option<usize> {
        (1..self.max_level).find(|&level| {
            self.frames.keys().all(|&location| {
                self.effective_set(location, level) == self.effective_set(location, level + 1)
            })
        })
    }
}
