use indexmap::IndexMap;

use crate::FixtureMap;

/// A fixture value that lost a max-wins merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureConflict {
    pub fixture: String,
    /// Source whose value was dropped.
    pub dropped_from: String,
    pub dropped: i32,
    /// Source whose value survived.
    pub retained_from: String,
    pub retained: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedFixtures {
    pub fixtures: FixtureMap,
    pub conflicts: Vec<FixtureConflict>,
}

/// Combines fixture maps so that, for every key, the highest value wins.
///
/// Keys keep the position of their first appearance. Each value that loses to a strictly higher
/// one is reported as a conflict naming the source it came from; equal values are not conflicts.
/// The surviving value per key does not depend on the order of `sources`.
pub fn merge_max<'a, I>(sources: I) -> MergedFixtures
where
    I: IntoIterator<Item = (&'a str, &'a FixtureMap)>,
{
    let mut winners: IndexMap<&'a str, (i32, &'a str)> = IndexMap::new();
    let mut conflicts = Vec::new();

    for (source, fixtures) in sources {
        for (key, &value) in fixtures {
            let Some((held, held_from)) = winners.get_mut(key.as_str()) else {
                winners.insert(key.as_str(), (value, source));
                continue;
            };

            if value > *held {
                conflicts.push(FixtureConflict {
                    fixture: key.clone(),
                    dropped_from: held_from.to_string(),
                    dropped: *held,
                    retained_from: source.to_string(),
                    retained: value,
                });
                *held = value;
                *held_from = source;
            } else if value < *held {
                conflicts.push(FixtureConflict {
                    fixture: key.clone(),
                    dropped_from: source.to_string(),
                    dropped: value,
                    retained_from: held_from.to_string(),
                    retained: *held,
                });
            }
        }
    }

    MergedFixtures {
        fixtures: winners
            .into_iter()
            .map(|(key, (value, _))| (key, value))
            .collect(),
        conflicts,
    }
}
