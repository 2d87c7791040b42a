//! Onboarding steps, the canonical sequence, and legacy-id migration.
//!
//! Steps are stored as plain `{id, label, done, locked, completed_at}`
//! records. The set and order of ids is fixed by [`StepKind::ALL`]; every
//! read boundary runs stored steps through [`migrate_steps`] so legacy
//! ids, missing steps and stale lock flags are normalized in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical onboarding steps, in gating order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    ShiftSelection,
    Footwear,
    I9,
    PhotoBadge,
    FirstDay,
}

/// Ids written by earlier portal versions and the step they now denote.
const LEGACY_STEP_IDS: &[(&str, StepKind)] = &[
    ("documents", StepKind::PhotoBadge),
    ("badge", StepKind::PhotoBadge),
    ("first_day", StepKind::FirstDay),
];

/// Value of `stage` once every step is done.
pub const STAGE_COMPLETED: &str = "completed";

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::ShiftSelection,
        StepKind::Footwear,
        StepKind::I9,
        StepKind::PhotoBadge,
        StepKind::FirstDay,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StepKind::ShiftSelection => "shift_selection",
            StepKind::Footwear => "footwear",
            StepKind::I9 => "i9",
            StepKind::PhotoBadge => "photo_badge",
            StepKind::FirstDay => "firstday",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StepKind::ShiftSelection => "Shift Selection",
            StepKind::Footwear => "Safety Footwear",
            StepKind::I9 => "I-9 Verification Ready",
            StepKind::PhotoBadge => "Photo Badge",
            StepKind::FirstDay => "First Day Preparation",
        }
    }

    /// Position in the canonical sequence.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a canonical id. Legacy ids are not accepted here.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Look up a canonical or legacy id.
    pub fn from_stored_id(id: &str) -> Option<Self> {
        Self::from_id(id).or_else(|| {
            LEGACY_STEP_IDS
                .iter()
                .find(|(legacy, _)| *legacy == id)
                .map(|(_, kind)| *kind)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    fn pending(kind: StepKind) -> Self {
        Self {
            id: kind.id().to_string(),
            label: kind.label().to_string(),
            done: false,
            locked: kind.index() > 0,
            completed_at: None,
        }
    }

    /// Canonical kind of this step, if its id is canonical.
    pub fn kind(&self) -> Option<StepKind> {
        StepKind::from_id(&self.id)
    }
}

/// A fresh canonical sequence: step 0 unlocked, everything else locked.
pub fn default_steps() -> Vec<Step> {
    StepKind::ALL.into_iter().map(Step::pending).collect()
}

/// Normalize stored steps into the canonical sequence.
///
/// Canonical ids are matched first, then legacy ids. When several stored
/// entries map to the same step the step is done if any of them is, with
/// the earliest completion stamp. Unknown ids are dropped and missing
/// steps are filled in as pending. Lock flags are recomputed.
pub fn migrate_steps(stored: &[Step]) -> Vec<Step> {
    let mut steps = default_steps();
    for raw in stored {
        let Some(kind) = StepKind::from_stored_id(&raw.id) else {
            continue;
        };
        let step = &mut steps[kind.index()];
        if raw.done {
            step.done = true;
            step.completed_at = earliest(step.completed_at, raw.completed_at);
        }
    }
    recompute_locks(&mut steps);
    steps
}

/// Re-derive `locked` from `done`: step 0 is never locked and step `i`
/// is unlocked exactly when step `i - 1` is done.
pub fn recompute_locks(steps: &mut [Step]) {
    let mut previous_done = true;
    for step in steps.iter_mut() {
        step.locked = !previous_done;
        previous_done = step.done;
    }
}

/// Whether the gating invariant holds: no done step is followed by a
/// locked successor, and step 0 is unlocked.
pub fn gating_holds(steps: &[Step]) -> bool {
    steps.first().is_none_or(|s| !s.locked)
        && steps
            .windows(2)
            .all(|pair| pair[1].locked == !pair[0].done)
}

pub fn is_complete(steps: &[Step]) -> bool {
    !steps.is_empty() && steps.iter().all(|s| s.done)
}

/// First step that is not yet done.
pub fn next_step(steps: &[Step]) -> Option<&Step> {
    steps.iter().find(|s| !s.done)
}

/// The `stage` marker stored alongside the steps: the id of the next
/// step, or [`STAGE_COMPLETED`].
pub fn stage_for(steps: &[Step]) -> String {
    next_step(steps)
        .map(|s| s.id.clone())
        .unwrap_or_else(|| STAGE_COMPLETED.to_string())
}

/// Completion summary for progress displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn of(steps: &[Step]) -> Self {
        Self {
            completed: steps.iter().filter(|s| s.done).count(),
            total: steps.len(),
        }
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// The earlier of two optional completion stamps.
pub fn earliest(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
