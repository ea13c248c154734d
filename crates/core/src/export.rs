use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use cuegraph_fixtures::{self as fixtures, FixtureMap};
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::remote::{CueControlService, CueRef, RemoteCue};
use crate::timecode;
use crate::CueError;

/// A cue and its descendants as written to an export file. Times are in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedCue {
    #[serde(rename = "type")]
    pub cue_type: String,
    pub duration: f64,
    pub prewait: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<FixtureMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<u32>,
    /// Each entry holds a single cue keyed by its name.
    pub components: Vec<IndexMap<String, ExportedCue>>,
}

/// Exported sections keyed by the name of each direct child of the list.
pub type CueListExport = IndexMap<String, Vec<IndexMap<String, ExportedCue>>>;

type ExportFuture<'a> = Pin<Box<dyn Future<Output = Result<ExportedCue, CueError>> + Send + 'a>>;

/// Reads the cue list named `source` and everything under it. Nothing on the controller changes.
pub async fn export_cue_list<S>(
    service: &mut S,
    lists: &[RemoteCue],
    source: &str,
) -> Result<CueListExport, CueError>
where
    S: CueControlService + ?Sized,
{
    let list =
        RemoteCue::find_list(lists, source).ok_or_else(|| CueError::DestinationCueListNotFound {
            name: source.to_string(),
        })?;

    let mut export = CueListExport::new();
    for section in &list.cues {
        let mut components = Vec::with_capacity(section.cues.len());
        for cue in &section.cues {
            let exported = export_cue(&mut *service, cue).await?;
            components.push(IndexMap::from([(cue.name.clone(), exported)]));
        }
        debug!("Exported {} ({} cues)", section.label(), components.len());
        export.insert(section.label().to_string(), components);
    }

    Ok(export)
}

/// Writes `export` to `<dir>/<workspace_id>.json` and returns the path.
pub fn write_export(
    dir: &Path,
    workspace_id: &str,
    export: &CueListExport,
) -> Result<PathBuf, CueError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", workspace_id));
    fs::write(&path, serde_json::to_string_pretty(export)?)?;
    info!("Wrote {}", path.display());
    Ok(path)
}

fn cue_ref(cue: &RemoteCue) -> CueRef {
    if cue.number.is_empty() {
        CueRef::Id(cue.handle())
    } else {
        CueRef::Number(cue.number.clone())
    }
}

fn export_cue<'a, S>(service: &'a mut S, cue: &'a RemoteCue) -> ExportFuture<'a>
where
    S: CueControlService + ?Sized,
{
    Box::pin(async move {
        let target = cue_ref(cue);
        let duration = service.get_duration(&target).await?;
        let pre_wait = service.get_pre_wait(&target).await?;

        let fixtures = match cue.cue_type.as_str() {
            "Light" => {
                let text = service.get_light_string(&target).await?;
                let decoded =
                    fixtures::decode(&text).map_err(|source| CueError::MalformedFixtureString {
                        name: cue.name.clone(),
                        source,
                    })?;
                Some(decoded)
            }
            _ => None,
        };
        let patch = match cue.cue_type.as_str() {
            "Network" => Some(service.get_network_patch(&target).await?),
            _ => None,
        };

        let mut components = Vec::with_capacity(cue.cues.len());
        for child in &cue.cues {
            let exported = export_cue(&mut *service, child).await?;
            components.push(IndexMap::from([(child.name.clone(), exported)]));
        }

        Ok(ExportedCue {
            cue_type: cue.cue_type.clone(),
            duration: timecode::to_seconds(duration),
            prewait: timecode::to_seconds(pre_wait),
            fixtures,
            patch,
            components,
        })
    })
}
