//! Sheet import.
//!
//! Importing runs in three passes so that nothing is built on the controller from data known to
//! be invalid:
//!
//! 1. [`Importer::validate`] checks every row of every sheet (timestamps, cue names, command
//!    names) and reports all problems at once.
//! 2. [`Importer::prepare`] consolidates the events, fetches every fixture string the sheet needs
//!    and compiles the cue graph. Still read-only.
//! 3. [`Importer::emit`] builds the compiled graph at the end of the destination cue list.

use std::collections::HashSet;
use std::time::Instant;

use log::{info, warn};

use crate::catalog::{LightCueCatalog, LightCueKind};
use crate::command::CommandPattern;
use crate::compiler::{CompileOptions, CueGraphCompiler};
use crate::graph::{CueGraphNode, NodeKind};
use crate::remote::{CueControlService, RemoteCue, END_OF_LIST};
use crate::sequencer::Sequencer;
use crate::timecode::{self, TimeUnits};
use crate::timeline::{Consolidator, SheetTitle, TimedEvent};
use crate::{CueError, Warning};

/// One row of a show sheet: a cue number and the names fired by it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShowCue {
    pub key: String,
    pub names: Vec<String>,
    /// Line of the first row for this key.
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CueSheet {
    Song {
        title: SheetTitle,
        events: Vec<TimedEvent>,
    },
    Show {
        title: SheetTitle,
        cues: Vec<ShowCue>,
    },
}

impl CueSheet {
    pub fn title(&self) -> &SheetTitle {
        match self {
            CueSheet::Song { title, .. } | CueSheet::Show { title, .. } => title,
        }
    }

    /// Every cue name in the sheet with the line it appears on.
    fn names(&self) -> Vec<(&str, usize)> {
        match self {
            CueSheet::Song { events, .. } => events
                .iter()
                .map(|event| (event.name.as_str(), event.line))
                .collect(),
            CueSheet::Show { cues, .. } => cues
                .iter()
                .flat_map(|cue| cue.names.iter().map(move |name| (name.as_str(), cue.line)))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    /// Name of the cue list new cues are built in.
    pub destination: String,
    pub resolution: TimeUnits,
    pub compile: CompileOptions,
    /// Delete cues in the destination list that carry the sheet's cue number before building.
    pub replace_existing: bool,
    /// Color of the root group of every built sheet.
    pub root_color: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            destination: String::new(),
            resolution: 1,
            compile: CompileOptions::default(),
            replace_existing: false,
            root_color: None,
        }
    }
}

/// A compiled sheet, ready to be emitted.
#[derive(Clone, Debug)]
pub struct PreparedSheet {
    pub title: SheetTitle,
    pub graph: CueGraphNode,
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    pub title: String,
    pub cues_created: usize,
    pub warnings: Vec<Warning>,
}

pub struct Importer<'a> {
    catalog: &'a LightCueCatalog,
    commands: &'a CommandPattern,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    pub fn new(
        catalog: &'a LightCueCatalog,
        commands: &'a CommandPattern,
        options: ImportOptions,
    ) -> Self {
        Self {
            catalog,
            commands,
            options,
        }
    }

    /// Reports every malformed timestamp, unknown cue name and malformed command in the sheet.
    pub fn validate(&self, sheet: &CueSheet) -> Result<(), CueError> {
        let mut errors = Vec::new();

        if let CueSheet::Song { events, .. } = sheet {
            for event in events {
                for raw in [&event.start, &event.duration] {
                    if let Err(e) = timecode::normalize(raw) {
                        errors.push(e.at_line(event.line));
                    }
                }
            }
        }

        if let CueSheet::Show { cues, .. } = sheet {
            for cue in cues.iter().filter(|cue| cue.names.is_empty()) {
                errors.push(
                    CueError::EmptyShowCue {
                        key: cue.key.clone(),
                    }
                    .at_line(cue.line),
                );
            }
        }

        for (name, line) in sheet.names() {
            let result = if self.commands.matches(name) {
                self.commands.parse(name).map(|_| ())
            } else if self.catalog.contains(name) {
                Ok(())
            } else {
                Err(CueError::UnknownCueName {
                    name: name.to_string(),
                })
            };
            if let Err(e) = result {
                errors.push(e.at_line(line));
            }
        }

        CueError::check(errors)
    }

    /// Fetches the fixture strings of every scene and chase light state the sheet uses, collecting
    /// blank and malformed strings.
    pub async fn prefetch<S>(&self, service: &mut S, sheet: &CueSheet) -> Result<(), CueError>
    where
        S: CueControlService + ?Sized,
    {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (name, _) in sheet.names() {
            if !seen.insert(name) {
                continue;
            }
            let Some(cue) = self.catalog.get(name) else {
                continue;
            };
            let targets: Vec<(&str, &str)> = match cue.kind {
                LightCueKind::Scene => vec![(name, cue.number.as_str())],
                LightCueKind::Chase => cue
                    .light_states()
                    .map(|state| (state.name.as_str(), state.number.as_str()))
                    .collect(),
            };
            for (name, number) in targets {
                match self.catalog.get_or_load(service, name, number).await {
                    Ok(_) => {}
                    Err(e @ CueError::EmptyFixtureString { .. })
                    | Err(e @ CueError::MalformedFixtureString { .. }) => errors.push(e),
                    Err(e) => return Err(e),
                }
            }
        }

        CueError::check(errors)
    }

    /// Consolidates, prefetches and compiles a sheet without changing anything on the controller.
    pub async fn prepare<S>(&self, service: &mut S, sheet: &CueSheet) -> Result<PreparedSheet, CueError>
    where
        S: CueControlService + ?Sized,
    {
        self.prefetch(service, sheet).await?;

        let mut compiler = CueGraphCompiler::new(self.catalog, self.commands, self.options.compile);
        let mut graph = match sheet {
            CueSheet::Song { title, events } => {
                let consolidated = Consolidator::new(self.options.resolution).consolidate(events)?;
                info!(
                    "{}: {} rows consolidated into {} cues",
                    title.name,
                    events.len(),
                    consolidated.len()
                );
                compiler.compile_timeline(title, &consolidated)?
            }
            CueSheet::Show { title, cues } => compiler.compile_show(title, cues)?,
        };
        if let NodeKind::Group { color, .. } = &mut graph.kind {
            color.clone_from(&self.options.root_color);
        }

        Ok(PreparedSheet {
            title: sheet.title().clone(),
            graph,
            warnings: compiler.take_warnings(),
        })
    }

    /// Builds a prepared sheet at the end of the destination cue list.
    pub async fn emit<S>(&self, service: &mut S, prepared: &PreparedSheet) -> Result<ImportReport, CueError>
    where
        S: CueControlService + ?Sized,
    {
        let lists = service.list().await?;
        let list = RemoteCue::find_list(&lists, &self.options.destination).ok_or_else(|| {
            CueError::DestinationCueListNotFound {
                name: self.options.destination.clone(),
            }
        })?;
        let destination = list.handle();

        if self.options.replace_existing {
            if let Some(number) = &prepared.title.number {
                for existing in list.cues.iter().filter(|cue| &cue.number == number) {
                    info!(
                        "Replacing {} (cue {}) in {}",
                        existing.label(),
                        number,
                        self.options.destination
                    );
                    service.delete(&existing.handle()).await?;
                }
            }
        }

        service.select_by_id(&destination).await?;
        service.select_by_number(END_OF_LIST).await?;

        let started = Instant::now();
        let mut sequencer = Sequencer::new(service);
        sequencer.emit(&prepared.graph, Some(&destination)).await?;
        let cues_created = sequencer.created();
        info!(
            "Built {} with {} cues in {:.1}s",
            prepared.title.name,
            cues_created,
            started.elapsed().as_secs_f32()
        );

        Ok(ImportReport {
            title: prepared.title.name.clone(),
            cues_created,
            warnings: prepared.warnings.clone(),
        })
    }

    /// Validates and prepares every sheet, then emits them in order.
    pub async fn run<S>(&self, service: &mut S, sheets: &[CueSheet]) -> Result<Vec<ImportReport>, CueError>
    where
        S: CueControlService + ?Sized,
    {
        let mut errors = Vec::new();
        for sheet in sheets {
            info!("Validating {}", sheet.title().name);
            if let Err(e) = self.validate(sheet) {
                warn!("{} has errors", sheet.title().name);
                errors.push(e);
            }
        }
        CueError::check(errors)?;

        let mut errors = Vec::new();
        let mut prepared = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            match self.prepare(service, sheet).await {
                Ok(sheet) => prepared.push(sheet),
                Err(e @ CueError::Validation(_)) => errors.push(e),
                Err(e) => return Err(e),
            }
        }
        CueError::check(errors)?;

        let mut reports = Vec::with_capacity(prepared.len());
        for (i, sheet) in prepared.iter().enumerate() {
            info!(
                "Importing {} ({} of {})",
                sheet.title.name,
                i + 1,
                prepared.len()
            );
            reports.push(self.emit(service, sheet).await?);
        }
        Ok(reports)
    }
}
