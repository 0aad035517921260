//! Arena index over an execution history.
//!
//! Events stay in their original slice; parent/child links and iteration
//! frames are expressed as indices into it.

use super::event::{EventType, ExecutionEvent};
use crate::errors::HistoryCorrelationError;
use std::collections::{HashMap, HashSet};

/// One level of map nesting: (index of the `MapStateStarted` event, iteration).
pub(crate) type FrameEntry = (usize, u64);

/// The chain of map iterations an event runs inside, outermost first.
pub(crate) type Frame = Vec<FrameEntry>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Parent links, children and iteration frames of a history.
#[derive(Debug)]
pub struct EventIndex<'a> {
    events: &'a [ExecutionEvent],
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    frames: Vec<Frame>,
    /// For map-closing events, the `MapStateStarted` they close.
    closed_maps: Vec<Option<usize>>,
}

impl<'a> EventIndex<'a> {
    /// Builds the index, checking the back-references.
    ///
    /// # Errors
    ///
    /// Returns a [`HistoryCorrelationError`] for duplicate ids, dangling or
    /// cyclic back-references and malformed map iterations.
    pub fn build(events: &'a [ExecutionEvent]) -> Result<Self, HistoryCorrelationError> {
        let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(events.len());
        for (position, event) in events.iter().enumerate() {
            if by_id.insert(event.id.as_str(), position).is_some() {
                return Err(HistoryCorrelationError::DuplicateEventId {
                    event_id: event.id.to_string(),
                });
            }
        }

        let mut parents = Vec::with_capacity(events.len());
        let mut children = vec![Vec::new(); events.len()];
        for (position, event) in events.iter().enumerate() {
            let parent = match event.parent_id() {
                None => None,
                Some(previous) => Some(*by_id.get(previous.as_str()).ok_or_else(|| {
                    HistoryCorrelationError::DanglingReference {
                        event_id: event.id.to_string(),
                        previous_event_id: previous.to_string(),
                    }
                })?),
            };
            if let Some(parent) = parent {
                children[parent].push(position);
            }
            parents.push(parent);
        }

        let mut index = Self {
            events,
            parents,
            children,
            frames: vec![Vec::new(); events.len()],
            closed_maps: vec![None; events.len()],
        };
        index.resolve_frames()?;
        Ok(index)
    }

    /// Computes every event's frame, parents before children.
    fn resolve_frames(&mut self) -> Result<(), HistoryCorrelationError> {
        let mut marks = vec![Mark::Unvisited; self.events.len()];
        let mut started_iterations: HashSet<FrameEntry> = HashSet::new();

        for start in 0..self.events.len() {
            let mut chain = Vec::new();
            let mut current = Some(start);
            while let Some(position) = current {
                match marks[position] {
                    Mark::Done => break,
                    Mark::Visiting => {
                        return Err(HistoryCorrelationError::Cycle {
                            event_id: self.events[position].id.to_string(),
                        });
                    }
                    Mark::Unvisited => {
                        marks[position] = Mark::Visiting;
                        chain.push(position);
                        current = self.parents[position];
                    }
                }
            }

            for &position in chain.iter().rev() {
                let frame = self.frame_of(position, &mut started_iterations)?;
                self.frames[position] = frame;
                marks[position] = Mark::Done;
            }
        }
        Ok(())
    }

    fn frame_of(
        &mut self,
        position: usize,
        started_iterations: &mut HashSet<FrameEntry>,
    ) -> Result<Frame, HistoryCorrelationError> {
        let events = self.events;
        let event = &events[position];
        let parent = self.parents[position];
        let inherited = parent.map(|p| self.frames[p].clone()).unwrap_or_default();

        match event.event_type {
            EventType::MapStateStarted => {
                if event.map_state_started_event_details.is_none() {
                    return Err(HistoryCorrelationError::MissingMapDetails {
                        event_id: event.id.to_string(),
                    });
                }
                Ok(inherited)
            }
            EventType::MapIterationStarted => {
                let map = parent
                    .filter(|&p| self.events[p].event_type == EventType::MapStateStarted)
                    .ok_or_else(|| HistoryCorrelationError::OrphanIteration {
                        event_id: event.id.to_string(),
                    })?;
                let index = event
                    .map_iteration_started_event_details
                    .as_ref()
                    .map(|details| details.index)
                    .ok_or_else(|| HistoryCorrelationError::MissingIterationDetails {
                        event_id: event.id.to_string(),
                    })?;
                let length = self.map_length(map).unwrap_or(0);
                if index >= length {
                    return Err(HistoryCorrelationError::IterationOutOfRange {
                        event_id: event.id.to_string(),
                        index,
                        length,
                    });
                }
                if !started_iterations.insert((map, index)) {
                    return Err(HistoryCorrelationError::DuplicateIteration {
                        event_id: event.id.to_string(),
                        index,
                    });
                }

                let mut frame = inherited;
                frame.push((map, index));
                Ok(frame)
            }
            kind if kind.ends_iteration() => {
                let mut frame = inherited;
                if frame.pop().is_none() {
                    return Err(HistoryCorrelationError::OrphanIteration {
                        event_id: event.id.to_string(),
                    });
                }
                Ok(frame)
            }
            _ if self.closes_map(position) => {
                let map = self
                    .enclosing_map(position)
                    .ok_or_else(|| HistoryCorrelationError::UnmatchedMapClose {
                        event_id: event.id.to_string(),
                    })?;
                self.closed_maps[position] = Some(map);
                Ok(self.frames[map].clone())
            }
            EventType::TaskStateEntered | EventType::TaskStateExited if event.state_name().is_none() => {
                Err(HistoryCorrelationError::MissingStepName {
                    event_id: event.id.to_string(),
                })
            }
            _ => Ok(inherited),
        }
    }

    /// True for the event that ends a map state's scope: its success,
    /// failure or abort, or a bare exit that follows none of those.
    fn closes_map(&self, position: usize) -> bool {
        match self.events[position].event_type {
            EventType::MapStateSucceeded
            | EventType::MapStateFailed
            | EventType::MapStateAborted => true,
            EventType::MapStateExited => self.parents[position]
                .map_or(true, |parent| self.closed_maps[parent].is_none()),
            _ => false,
        }
    }

    /// Finds the innermost `MapStateStarted` still open above an event.
    ///
    /// Maps already closed along the way are skipped whole, so an iteration
    /// chain that runs through inner maps still resolves to its own map.
    fn enclosing_map(&self, position: usize) -> Option<usize> {
        let mut current = self.parents[position];
        while let Some(ancestor) = current {
            if self.events[ancestor].event_type == EventType::MapStateStarted {
                return Some(ancestor);
            }
            current = match self.closed_maps[ancestor] {
                Some(map) => self.parents[map],
                None => self.parents[ancestor],
            };
        }
        None
    }

    /// Returns the indexed events.
    #[must_use]
    pub fn events(&self) -> &'a [ExecutionEvent] {
        self.events
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the parent of an event.
    #[must_use]
    pub fn parent(&self, position: usize) -> Option<usize> {
        self.parents.get(position).copied().flatten()
    }

    /// Returns the events caused by an event.
    #[must_use]
    pub fn children(&self, position: usize) -> &[usize] {
        self.children.get(position).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the map iterations an event runs inside, outermost first.
    pub(crate) fn frame(&self, position: usize) -> &[FrameEntry] {
        self.frames.get(position).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the iteration count of a `MapStateStarted` event.
    #[must_use]
    pub fn map_length(&self, position: usize) -> Option<u64> {
        self.events
            .get(position)
            .and_then(|event| event.map_state_started_event_details)
            .map(|details| details.length)
    }

    /// Finds the entry event a `TaskStateExited` event closes.
    ///
    /// Walks back along the parent chain; meeting another exit of the same
    /// step first means the exit is unpaired.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryCorrelationError::UnpairedExit`] if no entry is found.
    pub fn entry_for_exit(&self, exit: usize) -> Result<usize, HistoryCorrelationError> {
        let event = &self.events[exit];
        let name = event.state_name().ok_or_else(|| HistoryCorrelationError::MissingStepName {
            event_id: event.id.to_string(),
        })?;

        let mut current = self.parent(exit);
        while let Some(position) = current {
            let ancestor = &self.events[position];
            if ancestor.state_name() == Some(name) {
                match ancestor.event_type {
                    EventType::TaskStateEntered => return Ok(position),
                    EventType::TaskStateExited => break,
                    _ => {}
                }
            }
            current = self.parent(position);
        }

        Err(HistoryCorrelationError::UnpairedExit {
            event_id: event.id.to_string(),
            step: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{EventId, MapIterationDetails};
    use crate::testing::HistoryBuilder;

    fn position(events: &[ExecutionEvent], id: &EventId) -> usize {
        events.iter().position(|event| &event.id == id).unwrap()
    }

    #[test]
    fn test_children_and_frames() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 2);
        let first = history.iteration_started(&map, 0);
        let second = history.iteration_started(&map, 1);
        let entered = history.task_entered(Some(&first), "A");
        let events = history.build();

        let index = EventIndex::build(&events).unwrap();
        let map_pos = position(&events, &map);

        assert_eq!(index.children(map_pos).len(), 2);
        assert_eq!(index.frame(position(&events, &entered)), &[(map_pos, 0)]);
        assert_eq!(index.frame(position(&events, &second)), &[(map_pos, 1)]);
        assert_eq!(index.map_length(map_pos), Some(2));
    }

    #[test]
    fn test_iteration_end_leaves_the_frame() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 1);
        let iteration = history.iteration_started(&map, 0);
        let exit = history.task(Some(&iteration), "A");
        let done = history.iteration_succeeded(&exit, "Filters", 0);
        let events = history.build();

        let index = EventIndex::build(&events).unwrap();
        assert_eq!(index.frame(position(&events, &exit)).len(), 1);
        assert!(index.frame(position(&events, &done)).is_empty());
    }

    #[test]
    fn test_dangling_reference() {
        let mut history = HistoryBuilder::new();
        history.task_entered(Some(&EventId::new("missing")), "A");
        let err = EventIndex::build(&history.build()).unwrap_err();
        assert_eq!(err.code(), "HISTORY-002-DANGLING");
    }

    #[test]
    fn test_duplicate_ids() {
        let events = vec![
            ExecutionEvent::new(EventId::from(1_u64), EventType::ExecutionStarted, None),
            ExecutionEvent::new("1", EventType::Other, None),
        ];
        assert_eq!(EventIndex::build(&events).unwrap_err().code(), "HISTORY-001-DUPLICATE_ID");
    }

    #[test]
    fn test_cycle_detected() {
        let events = vec![
            ExecutionEvent::new("a", EventType::Other, Some(EventId::new("c"))),
            ExecutionEvent::new("b", EventType::Other, Some(EventId::new("a"))),
            ExecutionEvent::new("c", EventType::Other, Some(EventId::new("b"))),
        ];
        assert_eq!(EventIndex::build(&events).unwrap_err().code(), "HISTORY-003-CYCLE");
    }

    #[test]
    fn test_iteration_out_of_range() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 1);
        history.iteration_started(&map, 1);
        assert_eq!(
            EventIndex::build(&history.build()).unwrap_err().code(),
            "HISTORY-006-ITERATION_RANGE"
        );
    }

    #[test]
    fn test_retried_iteration_rejected() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 2);
        history.iteration_started(&map, 0);
        history.iteration_started(&map, 0);
        assert_eq!(
            EventIndex::build(&history.build()).unwrap_err().code(),
            "HISTORY-007-ITERATION_RETRY"
        );
    }

    #[test]
    fn test_iteration_outside_map() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let mut events = history.build();

        let mut event = ExecutionEvent::new("stray", EventType::MapIterationStarted, Some(root));
        event.map_iteration_started_event_details = Some(MapIterationDetails {
            name: "Filters".to_string(),
            index: 0,
        });
        events.push(event);

        assert_eq!(
            EventIndex::build(&events).unwrap_err().code(),
            "HISTORY-008-ORPHAN_ITERATION"
        );
    }

    #[test]
    fn test_map_start_without_length() {
        let events = vec![ExecutionEvent::new("m", EventType::MapStateStarted, None)];
        assert_eq!(EventIndex::build(&events).unwrap_err().code(), "HISTORY-004-MAP_DETAILS");
    }

    #[test]
    fn test_iteration_without_index() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 1);
        let mut events = history.build();
        events.push(ExecutionEvent::new("bare", EventType::MapIterationStarted, Some(map)));

        assert_eq!(
            EventIndex::build(&events).unwrap_err().code(),
            "HISTORY-005-ITERATION_DETAILS"
        );
    }

    #[test]
    fn test_task_entry_without_name() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let mut events = history.build();
        events.push(ExecutionEvent::new("nameless", EventType::TaskStateEntered, Some(root)));

        assert_eq!(EventIndex::build(&events).unwrap_err().code(), "HISTORY-010-STEP_NAME");
    }

    #[test]
    fn test_map_close_from_inside_an_iteration_leaves_the_map() {
        let mut history = HistoryBuilder::new();
        let map = history.map_started(None, "Filters", 2);
        let first = history.iteration_started(&map, 0);
        history.task(Some(&first), "X");
        let second = history.iteration_started(&map, 1);
        let last_exit = history.task(Some(&second), "X");
        let exited = history.map_finished(&last_exit, "Filters");
        let after = history.task_entered(Some(&exited), "DataIntegration");
        let events = history.build();

        let index = EventIndex::build(&events).unwrap();
        assert_eq!(index.frame(position(&events, &last_exit)).len(), 1);
        assert!(index.frame(position(&events, &exited)).is_empty());
        assert!(index.frame(position(&events, &after)).is_empty());
    }

    #[test]
    fn test_outer_map_close_skips_inner_maps() {
        let mut history = HistoryBuilder::new();
        let outer = history.map_started(None, "Outer", 1);
        let iteration = history.iteration_started(&outer, 0);
        let inner = history.map_started(Some(&iteration), "Inner", 1);
        let inner_iteration = history.iteration_started(&inner, 0);
        let exit = history.task(Some(&inner_iteration), "Deep");
        let inner_exit = history.map_finished(&exit, "Inner");
        let outer_exit = history.map_finished(&inner_exit, "Outer");
        let events = history.build();

        let index = EventIndex::build(&events).unwrap();
        let outer_pos = position(&events, &outer);
        assert_eq!(index.frame(position(&events, &inner_exit)), &[(outer_pos, 0)]);
        assert!(index.frame(position(&events, &outer_exit)).is_empty());
    }

    #[test]
    fn test_map_close_without_map() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        history.event(Some(&root), EventType::MapStateSucceeded);
        assert_eq!(
            EventIndex::build(&history.build()).unwrap_err().code(),
            "HISTORY-011-MAP_CLOSE"
        );
    }

    #[test]
    fn test_unpaired_exit() {
        let mut history = HistoryBuilder::new();
        let root = history.execution_started();
        let exit = history.task_exited(Some(&root), "A");
        let events = history.build();

        let index = EventIndex::build(&events).unwrap();
        assert_eq!(
            index.entry_for_exit(position(&events, &exit)).unwrap_err().code(),
            "HISTORY-009-UNPAIRED_EXIT"
        );
    }
}
