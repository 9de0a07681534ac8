//! Collection results.
//!
//! A run produces one [`TargetCollection`] per target, in target order, even
//! when nothing was captured, so that "evaluated, nothing seen" is never
//! confused with "not evaluated".

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::volume::BoundingVolume;


/// A query hit awaiting the visibility decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateHit<'a> {
    pub target: &'a str,
    pub actor: &'a str,
    pub volume: &'a BoundingVolume,
}

/// An actor that was inside a target and visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capture {
    pub actor: String,
    pub volume: BoundingVolume,
}

impl From<CandidateHit<'_>> for Capture {
    fn from(hit: CandidateHit<'_>) -> Self {
        Self {
            actor: hit.actor.to_string(),
            volume: hit.volume.clone(),
        }
    }
}

/// Outcome for one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetCollection {
    pub target: String,
    pub volume: BoundingVolume,
    /// Actors returned by the index query, before the visibility filter.
    pub candidates: usize,
    pub captures: Vec<Capture>,
}

impl TargetCollection {
    pub fn empty(target: &BoundingVolume) -> Self {
        Self {
            target: target.label().to_string(),
            volume: target.clone(),
            candidates: 0,
            captures: Vec::new(),
        }
    }
}

/// Per-target captures for a whole run, in target order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionReport {
    collections: Vec<TargetCollection>,
}

impl CollectionReport {
    pub fn new(collections: Vec<TargetCollection>) -> Self {
        Self { collections }
    }

    /// Number of targets evaluated.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// First entry for `target`.
    pub fn get(&self, target: &str) -> Option<&TargetCollection> {
        self.collections.iter().find(|c| c.target == target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetCollection> {
        self.collections.iter()
    }

    pub fn total_candidates(&self) -> usize {
        self.collections.iter().map(|c| c.candidates).sum()
    }

    pub fn total_captures(&self) -> usize {
        self.collections.iter().map(|c| c.captures.len()).sum()
    }

    /// All `(target, actor)` label pairs that were captured.
    pub fn capture_pairs(&self) -> BTreeSet<(String, String)> {
        self.collections
            .iter()
            .flat_map(|c| {
                c.captures
                    .iter()
                    .map(move |cap| (c.target.clone(), cap.actor.clone()))
            })
            .collect()
    }

    pub fn print(&self) {
        println!("{}", self);
    }
}

impl<'a> IntoIterator for &'a CollectionReport {
    type Item = &'a TargetCollection;
    type IntoIter = std::slice::Iter<'a, TargetCollection>;

    fn into_iter(self) -> Self::IntoIter {
        self.collections.iter()
    }
}

impl fmt::Display for CollectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_hits = self.iter().filter(|c| !c.captures.is_empty()).count();
        writeln!(f, "Collections:")?;
        writeln!(f, "  Targets:            {}", self.len())?;
        writeln!(f, "  Targets with hits:  {}", with_hits)?;
        writeln!(f, "  Candidates:         {}", self.total_candidates())?;
        write!(f, "  Captures:           {}", self.total_captures())
    }
}

/// Wall-clock durations of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTimings {
    /// Index construction.
    pub build: Duration,
    /// Querying and visibility filtering.
    pub collect: Duration,
}

impl RunTimings {
    pub fn total(&self) -> Duration {
        self.build + self.collect
    }
}

/// Report plus timings, as returned by [`crate::collection::CollectionEngine::run`].
#[derive(Debug, Clone)]
pub struct CollectionRun {
    pub report: CollectionReport,
    pub timings: RunTimings,
}
