use std::fmt;

use cuegraph_fixtures::FixtureConflict;

/// Non-fatal conditions collected while compiling a sheet and reported after a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A scene value lost a max-wins merge against another scene.
    FixtureDropped(FixtureConflict),
    /// A chase state's fixture was removed because a co-occurring scene also sets it.
    ChaseFixtureRemoved {
        chase: String,
        state: String,
        fixture: String,
        scene: String,
    },
    /// A chase state's fixture is kept and will override the co-occurring scene's value.
    ChaseFixtureOverride {
        chase: String,
        state: String,
        fixture: String,
        scene: String,
    },
    /// Several chases play in one group; their fixtures must not overlap.
    ChasesCombined { chases: Vec<String> },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::FixtureDropped(conflict) => write!(
                f,
                "Fixture '{}' value {} from '{}' dropped, retaining {} from '{}'",
                conflict.fixture,
                conflict.dropped,
                conflict.dropped_from,
                conflict.retained,
                conflict.retained_from
            ),
            Warning::ChaseFixtureRemoved {
                chase,
                state,
                fixture,
                scene,
            } => write!(
                f,
                "Fixture '{}' removed from '{} > {}' as it would override the scene '{}'",
                fixture, chase, state, scene
            ),
            Warning::ChaseFixtureOverride {
                chase,
                state,
                fixture,
                scene,
            } => write!(
                f,
                "Fixture '{}' in '{} > {}' will override the scene '{}'",
                fixture, chase, state, scene
            ),
            Warning::ChasesCombined { chases } => write!(
                f,
                "{} chases combined ({}), check they do not use the same fixtures",
                chases.len(),
                chases.join(", ")
            ),
        }
    }
}
