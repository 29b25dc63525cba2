//! Expansion of catalog entries into build instances.

use std::collections::BTreeMap;

use log::{debug, info};
use time::{macros::format_description, OffsetDateTime};

use crate::{
    catalog::{Catalog, Entry},
    error::{Error, Origin, Result},
    expr::{Context, Value},
    ordered::{Assignment, OrderedMap},
    tags::{self, TagRegistry},
    upstream::CommitCache,
};

/// One concrete image: an entry of the catalog with every matrix axis fixed and every template
/// rendered.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instance {
    /// Index of the entry under `images`.
    pub entry: usize,
    pub matrix: Assignment,
    pub context: String,
    pub dockerfile: String,
    pub path: String,
    pub tags: Vec<String>,
    pub args: OrderedMap<String>,
    pub keywords: Vec<String>,
    pub after_deploy_script: Vec<String>,
    #[serde(default)]
    pub nightly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl Instance {
    pub fn origin(&self) -> Origin {
        Origin::instance(self.entry, &self.matrix)
    }

    /// The shortest tag, ties broken alphabetically.
    pub fn shortest_tag(&self) -> &str {
        self.tags
            .iter()
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map_or("", String::as_str)
    }
}

/// Values shared by every instance of a run, exposed as `defaults`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub build_date: String,
}

impl Defaults {
    pub fn now() -> Result<Self> {
        let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
        let build_date = OffsetDateTime::now_utc()
            .format(&format)
            .map_err(|error| {
                Error::configuration(format!("failed to format the build date: {error}"))
            })?;
        Ok(Self { build_date })
    }
}

/// Expands every entry of the catalog, in order, and checks that no tag is produced twice.
pub fn expand(
    catalog: &Catalog,
    defaults: &Defaults,
    commits: &mut CommitCache,
) -> Result<Vec<Instance>> {
    let vars = Value::from(&catalog.vars);
    let mut registry = TagRegistry::new();
    let mut instances = Vec::new();

    for (index, entry) in catalog.entries.iter().enumerate() {
        let commit = match &entry.build.commit_api {
            Some(api) => Some(commits.get(api)?),
            None => None,
        };

        let mut shared = BTreeMap::from([(
            "build_date".to_owned(),
            Value::from(defaults.build_date.as_str()),
        )]);
        if let Some(commit) = &commit {
            shared.insert("commit".to_owned(), Value::from(commit.as_str()));
        }
        let shared = Value::Map(shared);

        let before = instances.len();
        for matrix in entry.matrix.expand() {
            let origin = Origin::instance(index, &matrix);
            let context = Context::new()
                .with("matrix", &matrix)
                .with("defaults", shared.clone())
                .with("vars", vars.clone());
            let instance = materialize(index, entry, matrix, &context, commit.clone())
                .map_err(|error| error.within(&origin))?;
            for tag in &instance.tags {
                registry.claim(tag, &origin)?;
            }
            instances.push(instance);
        }
        debug!("images[{index}] expands to {} instances", instances.len() - before);
    }

    info!(
        "{} instances with {} tags, no duplicate tag found",
        instances.len(),
        registry.len()
    );
    Ok(instances)
}

fn materialize(
    index: usize,
    entry: &Entry,
    matrix: Assignment,
    context: &Context,
    commit: Option<String>,
) -> Result<Instance> {
    let build = &entry.build;

    let tags = tags::resolve(&build.tags, context)?;
    let args = build.args.map_values(|_, template| template.render(context))?;
    let keywords = build
        .keywords
        .iter()
        .map(|template| template.render(context))
        .collect::<Result<Vec<_>, _>>()?;

    let mut after_deploy_script = Vec::new();
    for script in &build.after_deploy {
        if script.condition.holds(context)? {
            after_deploy_script.push(script.text.clone());
        }
    }

    Ok(Instance {
        entry: index,
        matrix,
        context: build.context.clone(),
        dockerfile: build.dockerfile.clone(),
        path: build.path(),
        tags,
        args,
        keywords,
        after_deploy_script,
        nightly: build.nightly,
        commit,
    })
}
