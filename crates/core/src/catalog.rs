//! The light cue catalog.
//!
//! Scenes and chases live in the controller under `Light Cues > Scenes` and
//! `Light Cues > Chases`. Walking that tree is slow (every chase state's duration is a separate
//! request), so the catalog can be persisted to a cache file and reused on later runs. Fixture
//! strings are fetched lazily by cue number and kept for the lifetime of the catalog.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Instant;

use cuegraph_fixtures::{self as fixtures, FixtureMap};
use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::remote::{CueControlService, CueRef, RemoteCue};
use crate::timecode::TimeUnits;
use crate::CueError;

/// Chase children the compiler builds itself, never copied from the controller.
const RESERVED_STATES: [&str; 2] = ["Loop", "Loop Group/Reset"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightCueKind {
    Scene,
    Chase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChaseStateKind {
    Light,
    Wait,
}

impl ChaseStateKind {
    fn from_cue_type(cue_type: &str) -> Option<Self> {
        match cue_type {
            "Light" => Some(ChaseStateKind::Light),
            "Wait" => Some(ChaseStateKind::Wait),
            _ => None,
        }
    }
}

/// One step of a chase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaseState {
    pub name: String,
    pub number: String,
    pub id: String,
    pub kind: ChaseStateKind,
    pub duration: TimeUnits,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCueDefinition {
    pub kind: LightCueKind,
    pub number: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chase_states: Vec<ChaseState>,
}

impl LightCueDefinition {
    pub fn light_states(&self) -> impl Iterator<Item = &ChaseState> {
        self.chase_states
            .iter()
            .filter(|state| state.kind == ChaseStateKind::Light)
    }
}

/// Persisted catalog format. Fixture strings are never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub version: String,
    pub generated_at: String,
    pub light_cues: IndexMap<String, LightCueDefinition>,
}

#[derive(Debug, Default)]
pub struct LightCueCatalog {
    cues: IndexMap<String, LightCueDefinition>,
    /// Decoded fixture strings by cue number.
    fixtures: Mutex<HashMap<String, FixtureMap>>,
}

impl LightCueCatalog {
    pub fn from_definitions(cues: IndexMap<String, LightCueDefinition>) -> Self {
        Self {
            cues,
            fixtures: Mutex::new(HashMap::new()),
        }
    }

    /// Walks the controller's cue lists and records every scene and chase.
    ///
    /// Integrity problems are collected across the whole tree before failing.
    pub async fn load<S>(
        service: &mut S,
        lists: &[RemoteCue],
        list_name: &str,
    ) -> Result<Self, CueError>
    where
        S: CueControlService + ?Sized,
    {
        let started = Instant::now();
        let mut cues = IndexMap::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        let branches = RemoteCue::find_list(lists, list_name)
            .map(|root| root.cues.as_slice())
            .unwrap_or_default();

        for branch in branches {
            let kind = match branch.label() {
                label if label.starts_with("Scenes") => LightCueKind::Scene,
                "Chases" => LightCueKind::Chase,
                other => {
                    debug!("Skipping light cue branch '{}'", other);
                    continue;
                }
            };

            for entry in &branch.cues {
                let name = entry.label().to_string();
                if !seen.insert(name.clone()) {
                    errors.push(CueError::DuplicateLightCueName { name });
                    continue;
                }
                if entry.number.is_empty() {
                    errors.push(CueError::MissingCueNumber { name });
                    continue;
                }

                let chase_states = match kind {
                    LightCueKind::Scene => Vec::new(),
                    LightCueKind::Chase => {
                        let states = Self::load_chase_states(service, entry, &mut errors).await?;
                        if !states.iter().any(|s| s.kind == ChaseStateKind::Light) {
                            errors.push(CueError::ChaseWithoutLightStates { name: name.clone() });
                        }
                        states
                    }
                };

                cues.insert(
                    name,
                    LightCueDefinition {
                        kind,
                        number: entry.number.clone(),
                        id: entry.unique_id.clone(),
                        chase_states,
                    },
                );
            }
        }

        CueError::check(errors)?;
        if cues.is_empty() {
            return Err(CueError::LightCuesNotFound {
                list: list_name.to_string(),
            });
        }

        info!(
            "Generated light cue list with {} cues in {:.1}s",
            cues.len(),
            started.elapsed().as_secs_f32()
        );
        Ok(Self::from_definitions(cues))
    }

    async fn load_chase_states<S>(
        service: &mut S,
        chase: &RemoteCue,
        errors: &mut Vec<CueError>,
    ) -> Result<Vec<ChaseState>, CueError>
    where
        S: CueControlService + ?Sized,
    {
        let mut states = Vec::new();
        for child in &chase.cues {
            let name = child.label();
            if RESERVED_STATES.contains(&name) {
                continue;
            }
            let Some(kind) = ChaseStateKind::from_cue_type(&child.cue_type) else {
                debug!(
                    "Skipping '{}' in chase '{}': {} cues are not chase states",
                    name,
                    chase.label(),
                    child.cue_type
                );
                continue;
            };
            if child.number.is_empty() {
                errors.push(CueError::MissingCueNumber {
                    name: name.to_string(),
                });
                continue;
            }

            let duration = service
                .get_duration(&CueRef::Number(child.number.clone()))
                .await?;
            states.push(ChaseState {
                name: name.to_string(),
                number: child.number.clone(),
                id: child.unique_id.clone(),
                kind,
                duration,
            });
        }
        Ok(states)
    }

    /// Uses the cache file when allowed and readable, otherwise walks the controller and
    /// rewrites the cache.
    pub async fn load_or_cached<S>(
        service: &mut S,
        lists: &[RemoteCue],
        list_name: &str,
        cache_path: &Path,
        use_cache: bool,
    ) -> Result<Self, CueError>
    where
        S: CueControlService + ?Sized,
    {
        if use_cache {
            match Self::read_cache(cache_path) {
                Ok(catalog) => {
                    info!("Using light cue cache file {}", cache_path.display());
                    return Ok(catalog);
                }
                Err(e) => info!(
                    "Unable to use light cue cache file {} ({}), generating light cue list",
                    cache_path.display(),
                    e
                ),
            }
        } else {
            info!("Generating light cue list");
        }

        let catalog = Self::load(service, lists, list_name).await?;
        if let Err(e) = catalog.write_cache(cache_path) {
            warn!(
                "Failed to write light cue cache {}: {}",
                cache_path.display(),
                e
            );
        }
        Ok(catalog)
    }

    pub fn read_cache(path: &Path) -> Result<Self, CueError> {
        let content = fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        if file.version != env!("CARGO_PKG_VERSION") {
            return Err(CueError::StaleCache {
                path: path.display().to_string(),
                version: file.version,
            });
        }
        if file.light_cues.is_empty() {
            return Err(CueError::LightCuesNotFound {
                list: path.display().to_string(),
            });
        }
        Ok(Self::from_definitions(file.light_cues))
    }

    pub fn write_cache(&self, path: &Path) -> Result<(), CueError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = CatalogFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            light_cues: self.cues.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LightCueDefinition> {
        self.cues.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cues.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LightCueDefinition)> {
        self.cues.iter()
    }

    pub fn scenes(&self) -> impl Iterator<Item = (&String, &LightCueDefinition)> {
        self.iter()
            .filter(|(_, cue)| cue.kind == LightCueKind::Scene)
    }

    /// Returns the fixtures of the cue numbered `number`, fetching them on first use. `name` is
    /// only used in errors.
    pub async fn get_or_load<S>(
        &self,
        service: &mut S,
        name: &str,
        number: &str,
    ) -> Result<FixtureMap, CueError>
    where
        S: CueControlService + ?Sized,
    {
        if let Some(fixtures) = self.cached_fixtures(number) {
            return Ok(fixtures);
        }

        let text = service
            .get_light_string(&CueRef::Number(number.to_string()))
            .await?;
        if text.trim().is_empty() {
            return Err(CueError::EmptyFixtureString {
                name: name.to_string(),
            });
        }
        let decoded = fixtures::decode(&text).map_err(|source| CueError::MalformedFixtureString {
            name: name.to_string(),
            source,
        })?;

        self.insert_fixtures(number, decoded.clone());
        Ok(decoded)
    }

    pub fn cached_fixtures(&self, number: &str) -> Option<FixtureMap> {
        self.fixtures.lock().get(number).cloned()
    }

    pub fn insert_fixtures(&self, number: &str, fixtures: FixtureMap) {
        self.fixtures.lock().insert(number.to_string(), fixtures);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::remote::fake::{cue, FakeController};

    /// `Light Cues` with scenes Red and Blue and a two-state chase Strobe.
    pub(crate) fn light_cues_tree() -> Vec<RemoteCue> {
        vec![
            cue("Main", "", "Cue List", vec![]),
            cue(
                "Light Cues",
                "",
                "Cue List",
                vec![
                    cue(
                        "Scenes (Inc. All Off)",
                        "",
                        "Group",
                        vec![cue("Red", "1", "Light", vec![]), cue("Blue", "2", "Light", vec![])],
                    ),
                    cue(
                        "Chases",
                        "",
                        "Group",
                        vec![cue(
                            "Strobe",
                            "10",
                            "Group",
                            vec![
                                cue("Strobe On", "10.1", "Light", vec![]),
                                cue("Strobe Wait", "10.2", "Wait", vec![]),
                                cue("Strobe Off", "10.3", "Light", vec![]),
                                cue("Loop Group/Reset", "10.4", "Group", vec![]),
                                cue("Memo", "10.5", "Memo", vec![]),
                            ],
                        )],
                    ),
                ],
            ),
        ]
    }

    #[tokio::test]
    async fn test_load_scenes_and_chases() {
        let lists = light_cues_tree();
        let mut controller = FakeController::new(lists.clone());
        controller.durations.insert("10.2".to_string(), 500);

        let catalog = LightCueCatalog::load(&mut controller, &lists, "Light Cues")
            .await
            .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("Red").unwrap().kind, LightCueKind::Scene);
        let strobe = catalog.get("Strobe").unwrap();
        assert_eq!(strobe.kind, LightCueKind::Chase);
        assert_eq!(strobe.number, "10");
        let states: Vec<(&str, ChaseStateKind, TimeUnits)> = strobe
            .chase_states
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.duration))
            .collect();
        assert_eq!(
            states,
            vec![
                ("Strobe On", ChaseStateKind::Light, 0),
                ("Strobe Wait", ChaseStateKind::Wait, 500),
                ("Strobe Off", ChaseStateKind::Light, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_integrity_errors_are_aggregated() {
        let lists = vec![cue(
            "Light Cues",
            "",
            "Cue List",
            vec![
                cue(
                    "Scenes",
                    "",
                    "Group",
                    vec![
                        cue("Red", "1", "Light", vec![]),
                        cue("Red", "2", "Light", vec![]),
                        cue("Green", "", "Light", vec![]),
                    ],
                ),
                cue(
                    "Chases",
                    "",
                    "Group",
                    vec![cue("Empty", "5", "Group", vec![cue("Pause", "5.1", "Wait", vec![])])],
                ),
            ],
        )];
        let mut controller = FakeController::new(lists.clone());

        let err = LightCueCatalog::load(&mut controller, &lists, "Light Cues")
            .await
            .unwrap_err();

        let messages = err.into_messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("\"Red\" exists more than once"));
        assert!(messages[1].contains("\"Green\" has no cue number"));
        assert!(messages[2].contains("\"Empty\" has no light states"));
    }

    #[tokio::test]
    async fn test_unnumbered_entry_still_counts_towards_duplicates() {
        let lists = vec![cue(
            "Light Cues",
            "",
            "Cue List",
            vec![cue(
                "Scenes",
                "",
                "Group",
                vec![
                    cue("Amber", "", "Light", vec![]),
                    cue("Amber", "3", "Light", vec![]),
                ],
            )],
        )];
        let mut controller = FakeController::new(lists.clone());

        let err = LightCueCatalog::load(&mut controller, &lists, "Light Cues")
            .await
            .unwrap_err();

        let messages = err.into_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("\"Amber\" has no cue number"));
        assert!(messages[1].contains("\"Amber\" exists more than once"));
    }

    #[tokio::test]
    async fn test_missing_branch_is_not_found() {
        let lists = vec![cue("Main", "", "Cue List", vec![])];
        let mut controller = FakeController::new(lists.clone());

        let err = LightCueCatalog::load(&mut controller, &lists, "Light Cues")
            .await
            .unwrap_err();

        assert!(matches!(err, CueError::LightCuesNotFound { .. }));
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_regeneration() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("lightcues.json");
        let lists = light_cues_tree();
        let mut controller = FakeController::new(lists.clone());

        fs::write(&cache_path, "not json").unwrap();
        let generated =
            LightCueCatalog::load_or_cached(&mut controller, &lists, "Light Cues", &cache_path, true)
                .await
                .unwrap();
        assert_eq!(generated.len(), 3);

        let file: CatalogFile =
            serde_json::from_str(&fs::read_to_string(&cache_path).unwrap()).unwrap();
        assert_eq!(file.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(file.light_cues.len(), 3);

        // The cache is now valid, so an empty controller tree is never consulted.
        let cached =
            LightCueCatalog::load_or_cached(&mut controller, &[], "Light Cues", &cache_path, true)
                .await
                .unwrap();
        assert_eq!(cached.get("Strobe"), generated.get("Strobe"));

        let err =
            LightCueCatalog::load_or_cached(&mut controller, &[], "Light Cues", &cache_path, false)
                .await
                .unwrap_err();
        assert!(matches!(err, CueError::LightCuesNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fixtures_are_fetched_once() {
        let lists = light_cues_tree();
        let mut controller = FakeController::new(lists.clone());
        controller
            .light_strings
            .insert("1".to_string(), "wash.red = 255\nwash.blue = 0\n".to_string());
        let catalog = LightCueCatalog::load(&mut controller, &lists, "Light Cues")
            .await
            .unwrap();

        let first = catalog.get_or_load(&mut controller, "Red", "1").await.unwrap();
        let second = catalog.get_or_load(&mut controller, "Red", "1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.get("wash.red"), Some(255));
        assert_eq!(controller.light_string_reads, 1);
    }

    #[tokio::test]
    async fn test_blank_and_malformed_fixture_strings() {
        let mut controller = FakeController::default();
        controller
            .light_strings
            .insert("2".to_string(), "wash.red 255".to_string());
        let catalog = LightCueCatalog::default();

        let blank = catalog.get_or_load(&mut controller, "Blue", "1").await;
        let malformed = catalog.get_or_load(&mut controller, "Green", "2").await;

        assert!(matches!(blank, Err(CueError::EmptyFixtureString { ref name }) if name == "Blue"));
        assert!(matches!(
            malformed,
            Err(CueError::MalformedFixtureString { ref name, .. }) if name == "Green"
        ));
    }
}
