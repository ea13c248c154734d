//! Event consolidation.
//!
//! Timeline rows are normalized to [`TimeUnits`], rows sharing a (start, duration) signature are
//! grouped, and nested intervals are absorbed until no interval strictly contains another. The
//! result drives cue graph compilation, one [`ConsolidatedEvent`] per compiled cue.

use log::debug;

use crate::timecode::{self, TimeUnits};
use crate::CueError;

/// One row of a song sheet, with its raw timecodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    pub name: String,
    pub start: String,
    pub duration: String,
    /// 1-based line in the source file, used when reporting errors.
    pub line: usize,
}

impl TimedEvent {
    pub fn new(name: impl Into<String>, start: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            duration: duration.into(),
            line: 0,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub name: String,
    pub start: TimeUnits,
    pub duration: TimeUnits,
}

impl NormalizedEvent {
    pub fn end(&self) -> TimeUnits {
        self.start.saturating_add(self.duration)
    }
}

/// Cue names that fire together over one interval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsolidatedEvent {
    /// Insertion ordered, no duplicates.
    pub names: Vec<String>,
    pub start: TimeUnits,
    pub duration: TimeUnits,
}

impl ConsolidatedEvent {
    pub fn new(names: Vec<String>, start: TimeUnits, duration: TimeUnits) -> Self {
        let mut event = Self {
            names: Vec::with_capacity(names.len()),
            start,
            duration,
        };
        event.add_names(names);
        event
    }

    pub fn end(&self) -> TimeUnits {
        self.start.saturating_add(self.duration)
    }

    pub fn signature(&self) -> (TimeUnits, TimeUnits) {
        (self.start, self.duration)
    }

    /// True when `other` lies within this interval without sharing its signature.
    pub fn strictly_contains(&self, other: &ConsolidatedEvent) -> bool {
        other.start >= self.start
            && other.end() <= self.end()
            && other.signature() != self.signature()
    }

    fn add_names<I: IntoIterator<Item = String>>(&mut self, names: I) {
        for name in names {
            if !self.names.contains(&name) {
                self.names.push(name);
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Consolidator {
    /// Starts and durations are rounded to this many milliseconds before grouping.
    pub resolution: TimeUnits,
}

impl Default for Consolidator {
    fn default() -> Self {
        Self { resolution: 1 }
    }
}

impl Consolidator {
    pub fn new(resolution: TimeUnits) -> Self {
        Self { resolution }
    }

    /// Normalizes every row, reporting all malformed timestamps with their line numbers.
    pub fn normalize(&self, events: &[TimedEvent]) -> Result<Vec<NormalizedEvent>, CueError> {
        let mut errors = Vec::new();
        let mut normalized = Vec::with_capacity(events.len());

        for event in events {
            let start = timecode::normalize(&event.start);
            let duration = timecode::normalize(&event.duration);
            match (start, duration) {
                (Ok(start), Ok(duration)) => normalized.push(NormalizedEvent {
                    name: event.name.clone(),
                    start: timecode::quantize(start, self.resolution),
                    duration: timecode::quantize(duration, self.resolution),
                }),
                (start, duration) => {
                    errors.extend(
                        [start.err(), duration.err()]
                            .into_iter()
                            .flatten()
                            .map(|e| e.at_line(event.line)),
                    );
                }
            }
        }

        CueError::check(errors)?;
        Ok(normalized)
    }

    pub fn consolidate(&self, events: &[TimedEvent]) -> Result<Vec<ConsolidatedEvent>, CueError> {
        let normalized = self.normalize(events)?;
        let entries = normalized
            .into_iter()
            .map(|event| ConsolidatedEvent::new(vec![event.name], event.start, event.duration))
            .collect();
        Ok(self.consolidate_entries(entries))
    }

    /// Groups and absorbs already consolidated entries. Applying it to its own output returns
    /// that output unchanged.
    pub fn consolidate_entries(&self, entries: Vec<ConsolidatedEvent>) -> Vec<ConsolidatedEvent> {
        let mut consolidated = absorb(group(entries));
        consolidated.sort_by_key(|event| event.start);
        consolidated
    }
}

/// Merges entries with identical signatures, keeping the position of the first one.
pub fn group(entries: Vec<ConsolidatedEvent>) -> Vec<ConsolidatedEvent> {
    let mut grouped: Vec<ConsolidatedEvent> = Vec::with_capacity(entries.len());
    for entry in entries {
        match grouped
            .iter_mut()
            .find(|existing| existing.signature() == entry.signature())
        {
            Some(existing) => existing.add_names(entry.names),
            None => grouped.push(entry),
        }
    }
    grouped
}

/// Resolves nested intervals.
///
/// Each contained entry takes the names of its first container (in current order) ahead of its
/// own, and keeps its own interval. Containers that are not themselves contained are dropped.
/// Rounds repeat until no entry strictly contains another.
pub fn absorb(mut entries: Vec<ConsolidatedEvent>) -> Vec<ConsolidatedEvent> {
    let mut round = 0;
    loop {
        let parents: Vec<Option<usize>> = entries
            .iter()
            .map(|child| entries.iter().position(|parent| parent.strictly_contains(child)))
            .collect();

        if parents.iter().all(Option::is_none) {
            return entries;
        }

        round += 1;
        let is_container: Vec<bool> = (0..entries.len())
            .map(|i| parents.contains(&Some(i)))
            .collect();

        let next: Vec<ConsolidatedEvent> = entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match parents[i] {
                Some(parent) => {
                    let mut absorbed = ConsolidatedEvent {
                        names: entries[parent].names.clone(),
                        start: entry.start,
                        duration: entry.duration,
                    };
                    absorbed.add_names(entry.names.iter().cloned());
                    Some(absorbed)
                }
                None if is_container[i] => None,
                None => Some(entry.clone()),
            })
            .collect();

        debug!(
            "Absorption round {}: {} entries -> {}",
            round,
            entries.len(),
            next.len()
        );
        entries = group(next);
    }
}

/// A sheet's root group title, taken from its file stem.
///
/// `[12]Opener` is cue number `12` named `Opener`; any other stem is used as the name as is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetTitle {
    pub number: Option<String>,
    pub name: String,
}

impl SheetTitle {
    pub fn from_stem(stem: &str) -> Self {
        if let Some(rest) = stem.strip_prefix('[') {
            if let Some((number, name)) = rest.split_once(']') {
                if !number.is_empty() {
                    return Self {
                        number: Some(number.to_string()),
                        name: name.trim().to_string(),
                    };
                }
            }
        }
        Self {
            number: None,
            name: stem.to_string(),
        }
    }
}
