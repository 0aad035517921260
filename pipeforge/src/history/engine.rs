//! Step completion replay.

use super::event::{EventType, ExecutionEvent};
use super::index::{EventIndex, Frame, FrameEntry};
use crate::errors::HistoryCorrelationError;
use crate::observability::SpanTimer;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Exits recorded for one step, keyed by the iteration frames they ran in.
#[derive(Debug, Default)]
struct StepCoverage {
    exits: HashSet<Frame>,
    /// For each frame prefix, the maps the step ran inside directly below it.
    maps_below: HashMap<Frame, BTreeSet<usize>>,
}

impl StepCoverage {
    fn record(&mut self, frame: &[FrameEntry]) {
        for depth in 0..frame.len() {
            self.maps_below
                .entry(frame[..depth].to_vec())
                .or_default()
                .insert(frame[depth].0);
        }
        self.exits.insert(frame.to_vec());
    }

    /// True if the step has exited at `prefix`, or in every iteration of some
    /// map directly below it.
    fn covers(&self, prefix: &mut Frame, index: &EventIndex<'_>) -> bool {
        if self.exits.contains(prefix.as_slice()) {
            return true;
        }
        let Some(maps) = self.maps_below.get(prefix.as_slice()) else {
            return false;
        };

        for &map in maps {
            let length = index.map_length(map).unwrap_or(0);
            let mut all = true;
            for iteration in 0..length {
                prefix.push((map, iteration));
                let covered = self.covers(prefix, index);
                prefix.pop();
                if !covered {
                    all = false;
                    break;
                }
            }
            if all {
                return true;
            }
        }
        false
    }
}

/// Replays execution histories into completed step names.
///
/// Holds no state between calls; every query rebuilds its index.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionHistoryEngine;

impl ExecutionHistoryEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the steps that completed in every iteration of every map they
    /// run in, in the order they became complete.
    ///
    /// A step outside any map completes with its own exit. Truncated
    /// histories yield the steps complete so far.
    ///
    /// # Errors
    ///
    /// Returns a [`HistoryCorrelationError`] if the back-references are
    /// malformed.
    pub fn completed_steps(&self, events: &[ExecutionEvent]) -> Result<Vec<String>, HistoryCorrelationError> {
        let timer = SpanTimer::start("history.replay");
        let index = EventIndex::build(events)?;

        let mut coverage: HashMap<&str, StepCoverage> = HashMap::new();
        let mut emitted: HashSet<&str> = HashSet::new();
        let mut completed = Vec::new();

        for (position, event) in events.iter().enumerate() {
            if event.event_type != EventType::TaskStateExited {
                continue;
            }
            index.entry_for_exit(position)?;
            let Some(step) = event.state_name() else {
                continue;
            };

            let record = coverage.entry(step).or_default();
            record.record(index.frame(position));

            if !emitted.contains(step) && record.covers(&mut Vec::new(), &index) {
                debug!(step, event_id = %event.id, "Step completed in every branch");
                emitted.insert(step);
                completed.push(step.to_string());
            }
        }

        debug!(
            events = events.len(),
            completed = completed.len(),
            duration_ms = timer.elapsed_ms(),
            "Replayed execution history"
        );
        Ok(completed)
    }
}

/// Replays a history with a fresh engine.
///
/// # Errors
///
/// See [`ExecutionHistoryEngine::completed_steps`].
pub fn completed_steps(events: &[ExecutionEvent]) -> Result<Vec<String>, HistoryCorrelationError> {
    ExecutionHistoryEngine::new().completed_steps(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HistoryBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_history() {
        assert_eq!(completed_steps(&[]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_linear_steps_complete_on_exit() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let first = history.task(Some(&root), "DownloadGem");
        let second = history.task(Some(&first), "PreProcessing");
        history.task_entered(Some(&second), "EmptyDrops");

        assert_eq!(
            completed_steps(&history.build()).unwrap(),
            vec!["DownloadGem", "PreProcessing"]
        );
    }

    #[test]
    fn test_partial_map_withholds_step() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 2);
        let zero = history.iteration_started(&map, 0);
        let one = history.iteration_started(&map, 1);
        history.task(Some(&zero), "X");
        let events_before = history.events().to_vec();
        history.task(Some(&one), "X");

        assert!(completed_steps(&events_before).unwrap().is_empty());
        assert_eq!(completed_steps(&history.build()).unwrap(), vec!["X"]);
    }

    #[test]
    fn test_unstarted_iteration_withholds_step() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 3);
        for index in 0..2 {
            let iteration = history.iteration_started(&map, index);
            history.task(Some(&iteration), "X");
        }
        assert!(completed_steps(&history.build()).unwrap().is_empty());
    }

    #[test]
    fn test_nested_maps_need_every_inner_iteration() {
        let mut history = HistoryBuilder::new();
        let outer = history.map_started(None, "Outer", 2);

        let mut last = None;
        for outer_index in 0..2 {
            let outer_iteration = history.iteration_started(&outer, outer_index);
            let inner = history.map_started(Some(&outer_iteration), &format!("Inner{outer_index}"), 2);
            for inner_index in 0..2 {
                if outer_index == 1 && inner_index == 1 {
                    last = Some(history.iteration_started(&inner, inner_index));
                    continue;
                }
                let inner_iteration = history.iteration_started(&inner, inner_index);
                history.task(Some(&inner_iteration), "Deep");
            }
        }

        assert!(completed_steps(history.events()).unwrap().is_empty());

        let pending = last.unwrap();
        history.task(Some(&pending), "Deep");
        assert_eq!(completed_steps(&history.build()).unwrap(), vec!["Deep"]);
    }

    #[test]
    fn test_unpaired_exit_is_an_error() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        history.task_exited(Some(&root), "Ghost");
        let err = completed_steps(&history.build()).unwrap_err();
        assert_eq!(err.code(), "HISTORY-009-UNPAIRED_EXIT");
    }
}
