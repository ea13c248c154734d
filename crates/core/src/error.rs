use cuegraph_fixtures::FixtureError;
use thiserror::Error;

use crate::graph::NodeId;
use crate::remote::TransportError;

/// Errors raised while reading cue sheets, building the light cue catalog, compiling cue graphs
/// or talking to the show controller.
#[derive(Debug, Error)]
pub enum CueError {
    #[error("'{input}' is not a valid timestamp, expected M:SS.fff")]
    MalformedTimestamp { input: String },

    #[error("'{name}' - could not find a light cue with a matching name")]
    UnknownCueName { name: String },

    #[error(
        "'{name}' - {prefix} cues should be in the format \"{prefix}XX - YY\" where XX is a zero \
         padded channel number (or ALL) and YY is either ON or OFF"
    )]
    MalformedCommandPattern { name: String, prefix: String },

    #[error("show cue {key} has no cue names")]
    EmptyShowCue { key: String },

    #[error("\"{name}\" exists more than once, all light cues must be individually named")]
    DuplicateLightCueName { name: String },

    #[error("\"{name}\" has no cue number, all light cues must have a number")]
    MissingCueNumber { name: String },

    #[error("\"{name}\" has no light states")]
    ChaseWithoutLightStates { name: String },

    #[error("unable to find light cues, ensure '{list} > Scenes' and '{list} > Chases' exist")]
    LightCuesNotFound { list: String },

    #[error("light string blank for {name}")]
    EmptyFixtureString { name: String },

    #[error("light string for {name} is malformed: {source}")]
    MalformedFixtureString {
        name: String,
        #[source]
        source: FixtureError,
    },

    #[error("light cue cache {path} was written by version {version}")]
    StaleCache { path: String, version: String },

    #[error("fixtures for {name} were not loaded before compiling")]
    FixturesNotResolved { name: String },

    #[error("cue node {0} was referenced before it was created")]
    UnresolvedTarget(NodeId),

    #[error("no acknowledgment for {address} after {attempts} attempts")]
    RemoteNoAcknowledgment { address: String, attempts: u32 },

    #[error("unexpected reply to {address}: {detail}")]
    UnexpectedReply { address: String, detail: String },

    #[error("unable to find destination cue list \"{name}\"")]
    DestinationCueListNotFound { name: String },

    #[error("[Line {line}] {source}")]
    Row {
        line: usize,
        #[source]
        source: Box<CueError>,
    },

    #[error("{} validation error(s) found", .0.len())]
    Validation(Vec<CueError>),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CueError {
    pub fn at_line(self, line: usize) -> Self {
        CueError::Row {
            line,
            source: Box::new(self),
        }
    }

    /// Wraps collected errors, or returns `Ok` when there are none.
    pub fn check(errors: Vec<CueError>) -> Result<(), CueError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CueError::Validation(errors))
        }
    }

    /// Flattens nested validation errors into a single list for reporting.
    pub fn into_messages(self) -> Vec<String> {
        match self {
            CueError::Validation(errors) => errors
                .into_iter()
                .flat_map(CueError::into_messages)
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_errors_carry_line_numbers() {
        let err = CueError::UnknownCueName {
            name: "Blue Wash".to_string(),
        }
        .at_line(4);

        assert_eq!(
            err.to_string(),
            "[Line 4] 'Blue Wash' - could not find a light cue with a matching name"
        );
    }

    #[test]
    fn test_check_and_flatten() {
        assert!(CueError::check(vec![]).is_ok());

        let err = CueError::check(vec![
            CueError::MissingCueNumber {
                name: "Red".to_string(),
            },
            CueError::Validation(vec![CueError::DuplicateLightCueName {
                name: "Blue".to_string(),
            }]),
        ])
        .unwrap_err();

        assert_eq!(err.to_string(), "2 validation error(s) found");
        assert_eq!(err.into_messages().len(), 2);
    }
}
