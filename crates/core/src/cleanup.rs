use cuegraph_fixtures::FixtureMap;
use log::info;

use crate::catalog::LightCueCatalog;
use crate::graph::{CueGraphNode, NodeIdAllocator, NodeKind};
use crate::remote::{CueControlService, RemoteCue, END_OF_LIST};
use crate::sequencer::Sequencer;
use crate::CueError;

/// Keys zeroed by every rebuilt scene before its own values apply.
const BASE_KEYS: [&str; 7] = [
    "all.master",
    "all.red",
    "all.green",
    "all.blue",
    "all.white",
    "all.intensity",
    "all.coldsparklevel",
];

/// A scene's fixtures on top of a blank rig: the base keys at zero, then every nonzero value of
/// `scene`.
pub fn scene_reset_fixtures(scene: &FixtureMap) -> FixtureMap {
    let mut fixtures: FixtureMap = BASE_KEYS.iter().map(|key| (*key, 0)).collect();
    fixtures.extend(
        scene
            .iter()
            .filter(|(_, value)| **value != 0)
            .map(|(key, value)| (key.as_str(), *value)),
    );
    fixtures
}

/// Appends one light cue per catalog scene to the `destination` list, each starting from a blank
/// rig. Every scene's fixture string is read before anything is created. Returns the number of
/// cues created.
pub async fn rebuild_scenes<S>(
    service: &mut S,
    catalog: &LightCueCatalog,
    destination: &str,
) -> Result<usize, CueError>
where
    S: CueControlService + ?Sized,
{
    let mut errors = Vec::new();
    let mut scenes = Vec::new();
    for (name, cue) in catalog.scenes() {
        match catalog.get_or_load(service, name, &cue.number).await {
            Ok(fixtures) => scenes.push((name.clone(), scene_reset_fixtures(&fixtures))),
            Err(e @ CueError::EmptyFixtureString { .. })
            | Err(e @ CueError::MalformedFixtureString { .. }) => errors.push(e),
            Err(e) => return Err(e),
        }
    }
    CueError::check(errors)?;

    let lists = service.list().await?;
    let list = RemoteCue::find_list(&lists, destination)
        .map(RemoteCue::handle)
        .ok_or_else(|| CueError::DestinationCueListNotFound {
            name: destination.to_string(),
        })?;

    service.select_by_id(&list).await?;
    service.select_by_number(END_OF_LIST).await?;

    let mut ids = NodeIdAllocator::default();
    let mut sequencer = Sequencer::new(service);
    for (name, fixtures) in scenes {
        let node = CueGraphNode::new(
            ids.allocate(),
            name,
            NodeKind::Light {
                fixtures,
                duration: 0,
            },
        );
        sequencer.emit(&node, Some(&list)).await?;
    }

    let created = sequencer.created();
    info!("Rebuilt {} scenes in {}", created, destination);
    Ok(created)
}
