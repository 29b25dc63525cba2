//! Which instances to build.
//!
//! Every active selection contributes the instances it matches and the chosen set is their union.
//! The outdated instances are always part of it, unless `noop` is the only selection.

use std::{collections::BTreeSet, convert::Infallible, fmt};

use itertools::Itertools;
use log::info;

use crate::{instance::Instance, rules};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Minimal,
    Nightly,
    RebuildAll,
    RebuildFiles(BTreeSet<String>),
    RebuildTags(BTreeSet<String>),
    RebuildKeywords(BTreeSet<String>),
    Noop,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Minimal => f.write_str("minimal"),
            Selection::Nightly => f.write_str("nightly"),
            Selection::RebuildAll => f.write_str("rebuild-all"),
            Selection::RebuildFiles(files) => write!(f, "rebuild-file={}", files.iter().join(",")),
            Selection::RebuildTags(tags) => write!(f, "rebuild-tag={}", tags.iter().join(",")),
            Selection::RebuildKeywords(keywords) => {
                write!(f, "rebuild-keyword={}", keywords.iter().join(","))
            }
            Selection::Noop => f.write_str("noop"),
        }
    }
}

/// Matches the instances a selection adds on top of the outdated ones.
impl rules::Predicate<Instance> for Selection {
    type Error = Infallible;

    fn holds(&self, instance: &Instance) -> Result<bool, Infallible> {
        let any_in =
            |items: &[String], set: &BTreeSet<String>| items.iter().any(|item| set.contains(item));
        Ok(match self {
            Selection::Minimal | Selection::Noop => false,
            Selection::Nightly => instance.nightly,
            Selection::RebuildAll => true,
            Selection::RebuildFiles(files) => files.contains(&instance.path),
            Selection::RebuildTags(tags) => any_in(&instance.tags, tags),
            Selection::RebuildKeywords(keywords) => any_in(&instance.keywords, keywords),
        })
    }
}

/// The indices of the chosen instances, in catalog order. No selection at all means `minimal`.
pub fn choose(instances: &[Instance], outdated: &[usize], selections: &[Selection]) -> Vec<usize> {
    const MINIMAL: &[Selection] = &[Selection::Minimal];

    let selections = if selections.is_empty() {
        MINIMAL
    } else {
        selections
    };
    let include_outdated = selections.iter().any(|selection| *selection != Selection::Noop);

    let chosen = instances
        .iter()
        .enumerate()
        .filter(|(index, instance)| {
            (include_outdated && outdated.contains(index))
                || rules::any_match(selections, *instance).unwrap_or_else(|never| match never {})
        })
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    info!(
        "{} selects {} of {} instances",
        selections.iter().join("; "),
        chosen.len(),
        instances.len()
    );
    chosen
}
