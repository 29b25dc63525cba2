//! Loading of the `images.yml` catalog.
//!
//! YAML merge keys are applied first, then build templates are resolved against their `base`
//! chain so that every entry carries a complete copy of its build definition.

use std::{fmt, path::Path};

use image_reference::Repository;
use log::{info, warn};
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer,
};

use crate::{
    error::{Error, Origin, Result},
    expr::{Condition, Template, Value},
    matrix::{Matrix, Scalar},
    ordered::OrderedMap,
    propagate::{Child, ChildSpec},
    upstream::CommitApi,
};

#[derive(Debug, Clone, Deserialize)]
pub struct TagSpec {
    pub tag: Template,
    #[serde(rename = "if", default)]
    pub condition: Condition,
}

/// One line of an after-deploy script, copied verbatim so that shell expansions such as
/// `${VAR}` survive.
#[derive(Debug, Clone)]
pub struct Script {
    pub text: String,
    pub condition: Condition,
}

impl Script {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            condition: Condition::default(),
        }
    }
}

/// A line, or a `{script, if}` mapping.
impl<'de> Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Conditional {
            script: String,
            #[serde(rename = "if", default)]
            condition: Condition,
        }

        struct ScriptVisitor;

        impl<'de> Visitor<'de> for ScriptVisitor {
            type Value = Script;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a script line or a mapping with `script` and `if`")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Script, E> {
                Ok(Script::plain(v))
            }

            fn visit_map<A>(self, map: A) -> Result<Script, A::Error>
            where
                A: MapAccess<'de>,
            {
                let Conditional { script, condition } =
                    Conditional::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(Script {
                    text: script,
                    condition,
                })
            }
        }

        deserializer.deserialize_any(ScriptVisitor)
    }
}

/// `after_deploy`: a single line or a list of scripts.
#[derive(Debug, Clone, Default)]
struct AfterDeploySpec(Vec<Script>);

impl<'de> Deserialize<'de> for AfterDeploySpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AfterDeployVisitor;

        impl<'de> Visitor<'de> for AfterDeployVisitor {
            type Value = AfterDeploySpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a script line or a list of scripts")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<AfterDeploySpec, E> {
                Ok(AfterDeploySpec(vec![Script::plain(v)]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<AfterDeploySpec, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut scripts = Vec::new();
                while let Some(script) = seq.next_element()? {
                    scripts.push(script);
                }
                Ok(AfterDeploySpec(scripts))
            }
        }

        deserializer.deserialize_any(AfterDeployVisitor)
    }
}

/// A build definition as authored. Every field is optional because a template may leave any of
/// them to its base.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildSpec {
    base: Option<String>,
    context: Option<String>,
    dockerfile: Option<String>,
    tags: Option<Vec<TagSpec>>,
    args: Option<OrderedMap<Template>>,
    keywords: Option<Vec<Template>>,
    after_deploy: Option<AfterDeploySpec>,
    commit_api: Option<CommitApi>,
    nightly: Option<bool>,
}

impl BuildSpec {
    /// Shallow merge: fields present in `self` replace those of `parent`.
    fn over(self, parent: BuildSpec) -> BuildSpec {
        BuildSpec {
            base: self.base.or(parent.base),
            context: self.context.or(parent.context),
            dockerfile: self.dockerfile.or(parent.dockerfile),
            tags: self.tags.or(parent.tags),
            args: self.args.or(parent.args),
            keywords: self.keywords.or(parent.keywords),
            after_deploy: self.after_deploy.or(parent.after_deploy),
            commit_api: self.commit_api.or(parent.commit_api),
            nightly: self.nightly.or(parent.nightly),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntrySpec {
    matrix: OrderedMap<Vec<Scalar>>,
    build: BuildSpec,
}

#[derive(Debug, Deserialize)]
struct CatalogSpec {
    docker_repo: Repository,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    vars: OrderedMap<Value>,
    #[serde(default)]
    args: OrderedMap<Template>,
    #[serde(default)]
    templates: OrderedMap<serde_yaml::Value>,
    #[serde(default)]
    propagate: OrderedMap<ChildSpec>,
    images: Vec<serde_yaml::Value>,
}

/// A fully resolved build definition.
#[derive(Debug, Clone)]
pub struct Build {
    pub context: String,
    pub dockerfile: String,
    pub tags: Vec<TagSpec>,
    /// Catalog-level arguments with the entry's own merged over them.
    pub args: OrderedMap<Template>,
    pub keywords: Vec<Template>,
    pub after_deploy: Vec<Script>,
    pub commit_api: Option<CommitApi>,
    pub nightly: bool,
}

impl Build {
    /// `<context>/<dockerfile>`, the path selected by `rebuild-file`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.context, self.dockerfile)
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub matrix: Matrix,
    pub build: Build,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub docker_repo: Repository,
    pub base_url: Option<String>,
    pub vars: OrderedMap<Value>,
    pub propagate: OrderedMap<Child>,
    pub entries: Vec<Entry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        info!("loading {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|error| Error::io(path, error))?;
        Self::parse(&text).map_err(|error| match error {
            Error::Configuration { origin, message } => Error::Configuration {
                origin,
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|error| Error::configuration(error.to_string()))?;
        apply_merge_keys(&mut value)?;

        let active = value
            .get("active")
            .and_then(serde_yaml::Value::as_bool)
            .unwrap_or_default();
        if !active {
            warn!(
                "the catalog is not active yet, update its images and Dockerfile templates, \
                 then set `active: true`"
            );
            return Err(Error::configuration("the catalog is not active"));
        }

        let spec: CatalogSpec = serde_yaml::from_value(value)
            .map_err(|error| Error::configuration(error.to_string()))?;

        let propagate = spec
            .propagate
            .iter()
            .map(|(name, child)| Ok::<_, Error>((name, Child::parse(name, child)?)))
            .collect::<Result<OrderedMap<Child>>>()?;

        let templates = spec
            .templates
            .into_iter()
            .map(|(name, template)| {
                let template = serde_yaml::from_value::<BuildSpec>(template).map_err(|error| {
                    Error::configuration(format!("in template {name:?}: {error}"))
                })?;
                Ok::<_, Error>((name, template))
            })
            .collect::<Result<OrderedMap<BuildSpec>>>()?;

        let entries = spec
            .images
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let origin = Origin::entry(index);
                let entry = serde_yaml::from_value::<EntrySpec>(entry)
                    .map_err(|error| Error::configuration(error.to_string()).within(&origin))?;
                resolve_entry(entry, &templates, &spec.args).map_err(|error| error.within(&origin))
            })
            .collect::<Result<Vec<_>>>()?;
        if entries.is_empty() {
            return Err(Error::configuration("the catalog lists no images"));
        }

        Ok(Self {
            docker_repo: spec.docker_repo,
            base_url: spec.base_url,
            vars: spec.vars,
            propagate,
            entries,
        })
    }
}

/// Replaces every `<<` key by the entries of the mapping, or list of mappings, it refers to. Merged
/// keys come first and explicit keys override them in place, so an entry that merges a matrix and
/// overrides one axis keeps the axis order of the merged one.
fn apply_merge_keys(value: &mut serde_yaml::Value) -> Result<()> {
    use serde_yaml::{Mapping, Value};

    match value {
        Value::Mapping(mapping) => {
            for (_, child) in mapping.iter_mut() {
                apply_merge_keys(child)?;
            }
            let Some(merge) = mapping.remove("<<") else {
                return Ok(());
            };
            let sources = match merge {
                Value::Mapping(source) => vec![source],
                Value::Sequence(sources) => sources
                    .into_iter()
                    .map(|source| match source {
                        Value::Mapping(source) => Ok(source),
                        _ => Err(Error::configuration("a merge key `<<` must refer to mappings")),
                    })
                    .collect::<Result<Vec<_>>>()?,
                _ => return Err(Error::configuration("a merge key `<<` must refer to a mapping")),
            };

            let mut merged = Mapping::new();
            for source in sources {
                for (key, value) in source {
                    if !merged.contains_key(&key) {
                        merged.insert(key, value);
                    }
                }
            }
            for (key, value) in std::mem::take(mapping) {
                merged.insert(key, value);
            }
            *mapping = merged;
        }
        Value::Sequence(items) => {
            for item in items {
                apply_merge_keys(item)?;
            }
        }
        Value::Tagged(tagged) => apply_merge_keys(&mut tagged.value)?,
        _ => {}
    }
    Ok(())
}

fn resolve_entry(
    entry: EntrySpec,
    templates: &OrderedMap<BuildSpec>,
    args: &OrderedMap<Template>,
) -> Result<Entry> {
    let matrix = Matrix::new(
        entry
            .matrix
            .into_iter()
            .map(|(axis, values)| {
                (axis, values.into_iter().map(|value| value.0).collect::<Vec<_>>())
            })
            .collect(),
    )?;

    let mut build = entry.build;
    let mut chain: Vec<String> = Vec::new();
    while let Some(base) = build.base.take() {
        if chain.contains(&base) {
            chain.push(base);
            return Err(Error::configuration(format!(
                "the template chain {} is cyclic",
                chain.join(" -> ")
            )));
        }
        let parent = templates
            .get(&base)
            .ok_or_else(|| Error::configuration(format!("unknown base template {base:?}")))?
            .clone();
        chain.push(base);
        build = build.over(parent);
    }

    let context = build
        .context
        .as_deref()
        .ok_or_else(|| Error::configuration("missing build.context"))?;
    let context = relative_path(context)?;
    let dockerfile = relative_path(build.dockerfile.as_deref().unwrap_or("Dockerfile"))?;
    let tags = build
        .tags
        .filter(|tags| !tags.is_empty())
        .ok_or_else(|| Error::configuration("missing build.tags"))?;

    Ok(Entry {
        matrix,
        build: Build {
            context,
            dockerfile,
            tags,
            args: args.clone().merged(build.args.unwrap_or_default()),
            keywords: build.keywords.unwrap_or_default(),
            after_deploy: build.after_deploy.unwrap_or_default().0,
            commit_api: build.commit_api,
            nightly: build.nightly.unwrap_or_default(),
        },
    })
}

/// Rejects absolute paths and strips a leading `./`.
fn relative_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Err(Error::configuration("expected a relative path, found an empty string"));
    }
    if path.starts_with('/') {
        return Err(Error::configuration(format!("expected a relative path, found {path:?}")));
    }
    Ok(path.strip_prefix("./").unwrap_or(path).to_owned())
}
