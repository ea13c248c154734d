pub use catalog::{
    CatalogFile, ChaseState, ChaseStateKind, LightCueCatalog, LightCueDefinition, LightCueKind,
};
pub use cleanup::{rebuild_scenes, scene_reset_fixtures};
pub use command::{CommandPattern, NetworkCommand};
pub use compiler::{CompileOptions, CueGraphCompiler};
pub use config::{ConfigError, ConfigFile, ConfigManager, SheetKind, Settings};
pub use error::CueError;
pub use export::{export_cue_list, write_export, CueListExport, ExportedCue};
pub use graph::{CueGraphNode, NodeId, NodeIdAllocator, NodeKind};
pub use import::{CueSheet, ImportOptions, ImportReport, Importer, PreparedSheet, ShowCue};
pub use remote::{
    ContinueMode, CueControlService, CueHandle, CueKind, CueRef, GroupMode, RemoteArg, RemoteCue,
    RemoteMessage, RemoteReply, RemoteWorkspace, RetryPolicy, Transport, TransportError,
};
pub use sequencer::Sequencer;
pub use timecode::TimeUnits;
pub use timeline::{ConsolidatedEvent, Consolidator, SheetTitle, TimedEvent};
pub use warning::Warning;

pub mod catalog;
mod cleanup;
mod command;
mod compiler;
mod config;
mod error;
mod export;
mod graph;
mod import;
pub mod remote;
mod sequencer;
pub mod timecode;
pub mod timeline;
mod warning;
