//! Cue graph compilation.
//!
//! Turns consolidated events into a tree of [`CueGraphNode`]s. Compilation is pure: every fixture
//! string it needs must already be in the catalog's fixture cache, so nothing here talks to the
//! controller and a compile error can never leave a half-built cue list behind.
//!
//! A chase compiles to a self-looping state machine:
//!
//! ```text
//! <chase> CONTAINER            timeline, pre-wait = event start
//! ├── <chase>                  fire first + enter
//! │   ├── <light state>...     auto-follow, state duration
//! │   ├── <wait state>...      auto-follow, state duration
//! │   └── Loop Group/Reset     fire first + go to next
//! │       ├── Loop             start cue targeting the first light state
//! │       └── Reset <last>     every fixture the chase left on, at 0
//! └── CHASE DURATION CONTAINER fire first + enter (omitted in reduced mode)
//!     ├── Wait <n> Seconds     event duration
//!     └── Stop Chase           stop cue targeting <chase>
//! ```

use cuegraph_fixtures::{merge_max, FixtureMap};
use log::debug;

use crate::catalog::{ChaseState, ChaseStateKind, LightCueCatalog, LightCueKind};
use crate::command::CommandPattern;
use crate::graph::{CueGraphNode, NodeId, NodeIdAllocator, NodeKind};
use crate::import::ShowCue;
use crate::remote::{ContinueMode, GroupMode};
use crate::timecode::{self, TimeUnits};
use crate::timeline::{ConsolidatedEvent, SheetTitle};
use crate::{CueError, Warning};

const LOOP_GROUP: &str = "Loop Group/Reset";
const LOOP: &str = "Loop";
const DURATION_CONTAINER: &str = "CHASE DURATION CONTAINER";
const STOP_CHASE: &str = "Stop Chase";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Remove a chase state's fixture when a co-occurring scene sets the same fixture, instead of
    /// letting the chase override it.
    pub chase_fixture_removal: bool,
}

/// What a cue name in a sheet refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CueClass {
    Scene,
    Chase,
    Command,
}

pub struct CueGraphCompiler<'a> {
    catalog: &'a LightCueCatalog,
    commands: &'a CommandPattern,
    options: CompileOptions,
    ids: NodeIdAllocator,
    warnings: Vec<Warning>,
}

impl<'a> CueGraphCompiler<'a> {
    pub fn new(
        catalog: &'a LightCueCatalog,
        commands: &'a CommandPattern,
        options: CompileOptions,
    ) -> Self {
        Self {
            catalog,
            commands,
            options,
            ids: NodeIdAllocator::default(),
            warnings: Vec::new(),
        }
    }

    /// Warnings recorded so far, leaving the compiler with none.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Compiles a song: one timeline group holding a cue per consolidated event.
    pub fn compile_timeline(
        &mut self,
        title: &SheetTitle,
        events: &[ConsolidatedEvent],
    ) -> Result<CueGraphNode, CueError> {
        let mut root = self.titled_group(title);
        for event in events {
            debug!(
                "Compiling {} at {} for {}",
                event.names.join(" + "),
                timecode::format_timecode(event.start),
                timecode::format_timecode(event.duration)
            );
            root.children.extend(self.compile_event(event, false)?);
        }
        Ok(root)
    }

    /// Compiles a show: one group per show cue, numbered after its key. Chases run until the
    /// operator moves on, so they are built without the duration container.
    pub fn compile_show(
        &mut self,
        title: &SheetTitle,
        cues: &[ShowCue],
    ) -> Result<CueGraphNode, CueError> {
        let mut root = self.titled_group(title);
        for cue in cues {
            if cue.names.is_empty() {
                return Err(CueError::EmptyShowCue {
                    key: cue.key.clone(),
                });
            }
            let event = ConsolidatedEvent::new(cue.names.clone(), 0, 0);
            let mut group = CueGraphNode::new(
                self.ids.allocate(),
                event.names.join(" + "),
                NodeKind::Group {
                    mode: GroupMode::Timeline,
                    number: Some(cue.key.clone()),
                    color: None,
                },
            );
            group.children = self.compile_event(&event, true)?;
            root.push(group);
        }
        Ok(root)
    }

    fn titled_group(&mut self, title: &SheetTitle) -> CueGraphNode {
        CueGraphNode::new(
            self.ids.allocate(),
            title.name.clone(),
            NodeKind::Group {
                mode: GroupMode::Timeline,
                number: title.number.clone(),
                color: None,
            },
        )
    }

    /// Compiles one consolidated event. Most events become a single node; a lone `ALL` command
    /// becomes one node per channel.
    pub fn compile_event(
        &mut self,
        event: &ConsolidatedEvent,
        reduced: bool,
    ) -> Result<Vec<CueGraphNode>, CueError> {
        match event.names.as_slice() {
            [name] => match self.classify(name)? {
                CueClass::Command => self.command_nodes(name, event.start),
                CueClass::Scene => Ok(vec![self.scene_light(name, event.start)?]),
                CueClass::Chase => Ok(vec![self.compile_chase(
                    name,
                    event.start,
                    event.duration,
                    None,
                    reduced,
                )?]),
            },
            names => self.compile_combined(names, event, reduced),
        }
    }

    fn compile_combined(
        &mut self,
        names: &[String],
        event: &ConsolidatedEvent,
        reduced: bool,
    ) -> Result<Vec<CueGraphNode>, CueError> {
        let mut scenes = Vec::new();
        let mut chases = Vec::new();
        let mut commands = Vec::new();
        for name in names {
            match self.classify(name)? {
                CueClass::Scene => scenes.push(name.as_str()),
                CueClass::Chase => chases.push(name.as_str()),
                CueClass::Command => commands.push(name.as_str()),
            }
        }

        let joined = names.join(" + ");
        if chases.is_empty() && commands.is_empty() {
            let fixtures = self.merge_scenes(&scenes)?;
            return Ok(vec![self.light(&joined, fixtures, event.start)]);
        }

        let mut group = CueGraphNode::group(self.ids.allocate(), joined, GroupMode::Timeline);

        if chases.len() > 1 {
            self.warnings.push(Warning::ChasesCombined {
                chases: chases.iter().map(|c| c.to_string()).collect(),
            });
        }

        let mut scene = None;
        if !scenes.is_empty() {
            let scene_name = scenes.join(" + ");
            let fixtures = self.merge_scenes(&scenes)?;
            group.push(self.light(&scene_name, fixtures.clone(), event.start));
            scene = Some((scene_name, fixtures));
        }

        for chase in chases {
            let existing = scene.as_ref().map(|(name, fixtures)| (name.as_str(), fixtures));
            let node = self.compile_chase(chase, event.start, event.duration, existing, reduced)?;
            group.push(node);
        }

        for command in commands {
            group.children.extend(self.command_nodes(command, event.start)?);
        }

        Ok(vec![group])
    }

    fn classify(&self, name: &str) -> Result<CueClass, CueError> {
        if self.commands.matches(name) {
            return Ok(CueClass::Command);
        }
        match self.catalog.get(name).map(|cue| cue.kind) {
            Some(LightCueKind::Scene) => Ok(CueClass::Scene),
            Some(LightCueKind::Chase) => Ok(CueClass::Chase),
            None => Err(CueError::UnknownCueName {
                name: name.to_string(),
            }),
        }
    }

    fn fixtures(&self, name: &str, number: &str) -> Result<FixtureMap, CueError> {
        self.catalog
            .cached_fixtures(number)
            .ok_or_else(|| CueError::FixturesNotResolved {
                name: name.to_string(),
            })
    }

    fn scene_fixtures(&self, name: &str) -> Result<FixtureMap, CueError> {
        let cue = self.catalog.get(name).ok_or_else(|| CueError::UnknownCueName {
            name: name.to_string(),
        })?;
        self.fixtures(name, &cue.number)
    }

    fn light(&mut self, name: &str, fixtures: FixtureMap, start: TimeUnits) -> CueGraphNode {
        CueGraphNode::new(
            self.ids.allocate(),
            name,
            NodeKind::Light {
                fixtures,
                duration: 0,
            },
        )
        .with_pre_wait(start)
    }

    fn scene_light(&mut self, name: &str, start: TimeUnits) -> Result<CueGraphNode, CueError> {
        let fixtures = self.scene_fixtures(name)?;
        Ok(self.light(name, fixtures, start))
    }

    /// Max-wins merge of the named scenes, recording every dropped value as a warning.
    pub fn merge_scenes(&mut self, names: &[&str]) -> Result<FixtureMap, CueError> {
        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            sources.push((*name, self.scene_fixtures(name)?));
        }

        let merged = merge_max(sources.iter().map(|(name, fixtures)| (*name, fixtures)));
        self.warnings
            .extend(merged.conflicts.into_iter().map(Warning::FixtureDropped));
        Ok(merged.fixtures)
    }

    fn command_nodes(&mut self, name: &str, start: TimeUnits) -> Result<Vec<CueGraphNode>, CueError> {
        let commands = self.commands.parse(name)?;
        Ok(commands
            .iter()
            .map(|command| {
                CueGraphNode::new(
                    self.ids.allocate(),
                    self.commands.label(command),
                    NodeKind::NetworkCommand {
                        patch: self.commands.patch,
                        command: self.commands.render(command),
                    },
                )
                .with_pre_wait(start)
            })
            .collect())
    }

    /// Builds the looping state machine for a chase. `existing` is the merged scene playing
    /// alongside it, whose fixtures the chase states are checked against.
    pub fn compile_chase(
        &mut self,
        name: &str,
        start: TimeUnits,
        duration: TimeUnits,
        existing: Option<(&str, &FixtureMap)>,
        reduced: bool,
    ) -> Result<CueGraphNode, CueError> {
        let catalog = self.catalog;
        let chase = catalog
            .get(name)
            .filter(|cue| cue.kind == LightCueKind::Chase)
            .ok_or_else(|| CueError::UnknownCueName {
                name: name.to_string(),
            })?;

        let container_id = self.ids.allocate();
        let body_id = self.ids.allocate();
        let mut body = CueGraphNode::group(body_id, name, GroupMode::FireFirstEnter);

        let mut first_light: Option<NodeId> = None;
        let mut last_light: Option<&str> = None;
        let mut final_values = FixtureMap::new();

        for state in &chase.chase_states {
            let id = self.ids.allocate();
            let kind = match state.kind {
                ChaseStateKind::Light => {
                    let mut fixtures = self.fixtures(&state.name, &state.number)?;
                    if let Some((scene, scene_fixtures)) = existing {
                        self.resolve_conflicts(name, state, scene, scene_fixtures, &mut fixtures);
                    }
                    final_values.extend(fixtures.iter().map(|(key, value)| (key.clone(), *value)));
                    first_light.get_or_insert(id);
                    last_light = Some(&state.name);
                    NodeKind::Light {
                        fixtures,
                        duration: state.duration,
                    }
                }
                ChaseStateKind::Wait => NodeKind::Wait {
                    duration: state.duration,
                },
            };
            body.push(
                CueGraphNode::new(id, state.name.clone(), kind)
                    .with_continue_mode(ContinueMode::AutoFollow),
            );
        }

        let (Some(first_light), Some(last_light)) = (first_light, last_light) else {
            return Err(CueError::ChaseWithoutLightStates {
                name: name.to_string(),
            });
        };

        let reset: FixtureMap = final_values
            .iter()
            .filter(|(_, value)| **value != 0)
            .map(|(key, _)| (key.clone(), 0))
            .collect();

        let loop_group = CueGraphNode::group(self.ids.allocate(), LOOP_GROUP, GroupMode::FireFirstGoNext)
            .with_children(vec![
                CueGraphNode::new(
                    self.ids.allocate(),
                    LOOP,
                    NodeKind::Start {
                        target: first_light,
                    },
                )
                .with_continue_mode(ContinueMode::AutoFollow),
                CueGraphNode::new(
                    self.ids.allocate(),
                    format!("Reset {}", last_light),
                    NodeKind::Light {
                        fixtures: reset,
                        duration: 0,
                    },
                ),
            ]);
        body.push(loop_group);

        let mut container = CueGraphNode::group(
            container_id,
            format!("{} CONTAINER", name),
            GroupMode::Timeline,
        )
        .with_pre_wait(start);
        container.push(body);

        if !reduced {
            let wait = CueGraphNode::new(
                self.ids.allocate(),
                format!("Wait {} Seconds", timecode::format_seconds(duration)),
                NodeKind::Wait { duration },
            )
            .with_continue_mode(ContinueMode::AutoFollow);
            let stop = CueGraphNode::new(
                self.ids.allocate(),
                STOP_CHASE,
                NodeKind::Stop { target: body_id },
            );
            container.push(
                CueGraphNode::group(self.ids.allocate(), DURATION_CONTAINER, GroupMode::FireFirstEnter)
                    .with_children(vec![wait, stop]),
            );
        }

        Ok(container)
    }

    fn resolve_conflicts(
        &mut self,
        chase: &str,
        state: &ChaseState,
        scene: &str,
        scene_fixtures: &FixtureMap,
        fixtures: &mut FixtureMap,
    ) {
        let shared: Vec<String> = fixtures
            .keys()
            .filter(|key| scene_fixtures.contains_key(key))
            .map(str::to_string)
            .collect();

        for fixture in shared {
            if self.options.chase_fixture_removal {
                fixtures.remove(&fixture);
                self.warnings.push(Warning::ChaseFixtureRemoved {
                    chase: chase.to_string(),
                    state: state.name.clone(),
                    fixture,
                    scene: scene.to_string(),
                });
            } else {
                self.warnings.push(Warning::ChaseFixtureOverride {
                    chase: chase.to_string(),
                    state: state.name.clone(),
                    fixture,
                    scene: scene.to_string(),
                });
            }
        }
    }
}
