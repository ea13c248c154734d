use thiserror::Error;

use crate::FixtureMap;

/// Errors raised while decoding light command text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("line {line}: expected `key = value`, found {text:?}")]
    MissingSeparator { line: usize, text: String },

    #[error("line {line}: empty fixture key")]
    EmptyKey { line: usize },

    #[error("line {line}: {value:?} is not an integer value")]
    InvalidValue { line: usize, value: String },
}

/// Parses light command text into a [`FixtureMap`].
///
/// Blank lines are skipped. A key that appears twice keeps its first position and its last value.
pub fn decode(text: &str) -> Result<FixtureMap, FixtureError> {
    let mut fixtures = FixtureMap::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let (key, value) = raw.split_once('=').ok_or_else(|| FixtureError::MissingSeparator {
            line,
            text: raw.to_string(),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(FixtureError::EmptyKey { line });
        }

        let value = value.trim();
        let value = value.parse::<i32>().map_err(|_| FixtureError::InvalidValue {
            line,
            value: value.to_string(),
        })?;

        fixtures.insert(key, value);
    }

    Ok(fixtures)
}

/// Renders a [`FixtureMap`] as light command text, one `key = value` line per entry.
pub fn encode(fixtures: &FixtureMap) -> String {
    let mut text = String::new();
    for (key, value) in fixtures {
        text.push_str(key);
        text.push_str(" = ");
        text.push_str(&value.to_string());
        text.push('\n');
    }
    text
}
