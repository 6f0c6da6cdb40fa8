//! Displayable progress per job.
//!
//! A job with known unit counts shows the exact ratio. Otherwise a synthetic
//! value creeps upward on every tick, capped below 100 so it never claims
//! completion early. Once a job completes, a short finishing phase walks the
//! value to 100 in fixed steps. The displayed value never decreases.

use std::collections::HashMap;

use rand::Rng;

use crate::{JobId, JobRecord, JobStatus, TrackerSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Active,
    Finishing,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    displayed: u8,
    exact: bool,
    phase: ProgressPhase,
}

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    entries: HashMap<JobId, Entry>,
    synthetic_cap: u8,
    synthetic_max_step: u8,
    finish_step: u8,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(&TrackerSettings::default())
    }
}

/// `round(100 * current / total)` clamped to `[0, 100]`; `None` when the
/// total is unknown.
pub fn exact_percent(current: u32, total: u32) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let ratio = f64::from(current) / f64::from(total);
    Some((ratio * 100.0).round().clamp(0.0, 100.0) as u8)
}

impl ProgressReporter {
    pub fn new(settings: &TrackerSettings) -> Self {
        Self {
            entries: HashMap::new(),
            synthetic_cap: settings.synthetic_cap.min(100),
            synthetic_max_step: settings.synthetic_max_step,
            finish_step: settings.finish_step.max(1),
        }
    }

    /// Feeds the latest state of a record into the reporter.
    pub fn observe(&mut self, record: &JobRecord) {
        let entry = self.entries.entry(record.id.clone()).or_insert(Entry {
            displayed: 0,
            exact: false,
            phase: ProgressPhase::Active,
        });
        if entry.phase != ProgressPhase::Active {
            return;
        }

        // Terminal counts are not applied directly; completion is animated.
        if !record.is_terminal() {
            if let Some(percent) = exact_percent(record.current_unit, record.total_units) {
                entry.exact = true;
                entry.displayed = entry.displayed.max(percent);
            }
        }

        match record.status {
            JobStatus::Complete if record.display_only => {
                entry.displayed = 100;
                entry.phase = ProgressPhase::Settled;
            }
            JobStatus::Complete => {
                entry.phase = if entry.displayed >= 100 {
                    ProgressPhase::Settled
                } else {
                    ProgressPhase::Finishing
                };
            }
            // Failures and cancellations freeze where they stopped.
            JobStatus::Error => entry.phase = ProgressPhase::Settled,
            _ => {}
        }
    }

    /// Synthetic tick: active jobs without exact counts move up by a random
    /// `[0, max_step]` points, never past the cap.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> bool {
        let mut changed = false;
        for entry in self.entries.values_mut() {
            if entry.phase != ProgressPhase::Active || entry.exact {
                continue;
            }
            if entry.displayed >= self.synthetic_cap {
                continue;
            }
            let step = rng.random_range(0..=self.synthetic_max_step);
            let next = entry
                .displayed
                .saturating_add(step)
                .min(self.synthetic_cap);
            if next > entry.displayed {
                entry.displayed = next;
                changed = true;
            }
        }
        changed
    }

    /// Completion-phase tick: fixed steps towards 100.
    pub fn finish_tick(&mut self) -> bool {
        let mut changed = false;
        for entry in self.entries.values_mut() {
            if entry.phase != ProgressPhase::Finishing {
                continue;
            }
            entry.displayed = entry.displayed.saturating_add(self.finish_step).min(100);
            if entry.displayed == 100 {
                entry.phase = ProgressPhase::Settled;
            }
            changed = true;
        }
        changed
    }

    pub fn percent(&self, id: &JobId) -> Option<u8> {
        self.entries.get(id).map(|entry| entry.displayed)
    }

    pub fn phase(&self, id: &JobId) -> Option<ProgressPhase> {
        self.entries.get(id).map(|entry| entry.phase)
    }

    pub fn forget(&mut self, id: &JobId) {
        self.entries.remove(id);
    }
}
