//! Triggering of dependent pipelines after a build.
//!
//! Every child repository has an ordered strategy. The first rule whose `when` holds over the
//! chosen instances decides the command sent to the child. Directives given on the command line
//! or in a commit message replace the strategy of the child they name.

use std::fmt;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    error::{Error, Result},
    expr::{self, Context, Template, Value},
    instance::Instance,
    matrix,
    ordered::OrderedMap,
    rules::{self, Rule},
};

/// A child repository as authored under `propagate`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildSpec {
    pub api_token_env_var: String,
    pub gitlab_domain: String,
    pub gitlab_project: String,
    #[serde(default)]
    pub strategy: Vec<RuleSpec>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(default)]
    pub subset: Option<String>,
    pub mode: ModeSpec,
}

/// `mode: nightly` or `mode: {rebuild-keyword: dev}`, the latter also written as
/// `mode: 'rebuild-keyword: dev'`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum ModeSpec {
    Text(String),
    Keyword {
        #[serde(rename = "rebuild-keyword")]
        rebuild_keyword: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum When {
    Always,
    RebuildAll,
    Forall { expr: Template, subset: Vec<String> },
    Exists { expr: Template, subset: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    RebuildAll,
    Nightly,
    Minimal,
    /// The item list is a template rendered over the chosen instances.
    RebuildKeyword(Template),
    Nil,
}

impl Mode {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        Ok(match text {
            "rebuild-all" => Mode::RebuildAll,
            "nightly" => Mode::Nightly,
            "minimal" => Mode::Minimal,
            "nil" => Mode::Nil,
            _ => {
                let items = text
                    .strip_prefix("rebuild-keyword")
                    .and_then(|rest| rest.trim_start().strip_prefix(':'))
                    .ok_or_else(|| {
                        format!(
                            "unknown mode {text:?}, expected one of rebuild-all, nightly, minimal, \
                             rebuild-keyword: <items>, nil"
                        )
                    })?;
                Self::keyword(items)?
            }
        })
    }

    fn keyword(items: &str) -> Result<Self, String> {
        let items = items.trim();
        if items.is_empty() {
            return Err("rebuild-keyword needs a list of keywords".to_owned());
        }
        Template::parse(items)
            .map(Mode::RebuildKeyword)
            .map_err(|error| error.to_string())
    }

    fn from_spec(spec: &ModeSpec) -> Result<Self, String> {
        match spec {
            ModeSpec::Text(text) => Self::parse(text),
            ModeSpec::Keyword { rebuild_keyword } => Self::keyword(rebuild_keyword),
        }
    }

    /// The command sent to the child, `None` for `nil`.
    fn directive(&self, context: &Context) -> Result<Option<String>, expr::Error> {
        Ok(Some(match self {
            Mode::RebuildAll => "rebuild-all".to_owned(),
            Mode::Nightly => "nightly".to_owned(),
            Mode::Minimal => "minimal".to_owned(),
            Mode::RebuildKeyword(items) => format!("rebuild-keyword={}", items.render(context)?),
            Mode::Nil => return Ok(None),
        }))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::RebuildAll => f.write_str("rebuild-all"),
            Mode::Nightly => f.write_str("nightly"),
            Mode::Minimal => f.write_str("minimal"),
            Mode::RebuildKeyword(items) => write!(f, "rebuild-keyword: {items}"),
            Mode::Nil => f.write_str("nil"),
        }
    }
}

impl When {
    fn parse(spec: &RuleSpec) -> Result<Self, String> {
        let subset = |spec: &RuleSpec| -> Result<Vec<String>, String> {
            let subset = spec.subset.as_deref().ok_or("forall and exists need a subset")?;
            Ok(subset
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect())
        };
        let expr = |spec: &RuleSpec| -> Result<Template, String> {
            let expr = spec.expr.as_deref().ok_or("forall and exists need an expr")?;
            Template::parse(expr).map_err(|error| error.to_string())
        };

        match spec.when.as_deref() {
            None | Some("rebuild-all") if spec.expr.is_some() || spec.subset.is_some() => {
                Err("expr and subset are only allowed with `when: forall` or `when: exists`"
                    .to_owned())
            }
            None => Ok(When::Always),
            Some("rebuild-all") => Ok(When::RebuildAll),
            Some("forall") => Ok(When::Forall {
                expr: expr(spec)?,
                subset: subset(spec)?,
            }),
            Some("exists") => Ok(When::Exists {
                expr: expr(spec)?,
                subset: subset(spec)?,
            }),
            Some(other) => Err(format!(
                "unknown condition {other:?}, expected one of rebuild-all, forall, exists"
            )),
        }
    }
}

/// What the strategies are evaluated against: the chosen instances as a whole.
#[derive(Debug, Clone)]
pub struct Aggregate {
    context: Context,
    rebuild_all: bool,
    empty: bool,
}

impl Aggregate {
    /// `matrix[axis]` lists the distinct values of `axis`, `keywords` and `tags` the distinct
    /// keywords and tags.
    pub fn new(chosen: &[&Instance], vars: &OrderedMap<Value>, rebuild_all: bool) -> Self {
        let matrix = matrix::group(chosen.iter().map(|instance| &instance.matrix));
        let distinct = |f: fn(&Instance) -> &[String]| -> Vec<String> {
            chosen.iter().flat_map(|instance| f(instance)).unique().cloned().collect()
        };

        let context = Context::new()
            .with("matrix", &matrix)
            .with("keywords", distinct(|instance| instance.keywords.as_slice()))
            .with("tags", distinct(|instance| instance.tags.as_slice()))
            .with("vars", vars);

        Self {
            context,
            rebuild_all,
            empty: chosen.is_empty(),
        }
    }
}

impl rules::Predicate<Aggregate> for When {
    type Error = expr::Error;

    fn holds(&self, aggregate: &Aggregate) -> Result<bool, expr::Error> {
        Ok(match self {
            When::Always => true,
            When::RebuildAll => aggregate.rebuild_all,
            When::Forall { expr, subset } => expr
                .evaluate_list(&aggregate.context)?
                .iter()
                .all(|item| subset.contains(item)),
            When::Exists { expr, subset } => expr
                .evaluate_list(&aggregate.context)?
                .iter()
                .any(|item| subset.contains(item)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub name: String,
    pub api_token_env_var: String,
    pub gitlab_domain: String,
    pub gitlab_project: String,
    pub strategy: Vec<Rule<When, Mode>>,
}

impl Child {
    pub fn parse(name: &str, spec: &ChildSpec) -> Result<Self> {
        let error = |message: String| Error::propagation(name, message);

        if !is_env_var_name(&spec.api_token_env_var) {
            return Err(error(format!(
                "{:?} is not a valid environment variable name",
                spec.api_token_env_var
            )));
        }

        let strategy = spec
            .strategy
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let at = |message: String| error(format!("strategy[{index}]: {message}"));
                Ok::<_, Error>(Rule {
                    when: When::parse(rule).map_err(at)?,
                    then: Mode::from_spec(&rule.mode).map_err(at)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_owned(),
            api_token_env_var: spec.api_token_env_var.clone(),
            gitlab_domain: spec.gitlab_domain.clone(),
            gitlab_project: spec.gitlab_project.clone(),
            strategy,
        })
    }
}

fn is_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `propagate=<child>: <mode>`, or `propagate=` alone which disables propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Disable,
    Override { child: String, mode: Mode },
}

impl Directive {
    /// Parses what follows `propagate=`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Directive::Disable);
        }
        let Some((child, mode)) = text.split_once(':') else {
            return Err(Error::propagation(
                text,
                "expected a directive of the form `propagate=<child>: <mode>`",
            ));
        };
        let child = child.trim();
        let mode = Mode::parse(mode).map_err(|message| Error::propagation(child, message))?;
        Ok(Directive::Override {
            child: child.to_owned(),
            mode,
        })
    }
}

/// A pipeline to trigger in a child repository.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Action {
    pub child: String,
    /// The commands passed to the child pipeline, e.g. `rebuild-keyword=dev,8.18`.
    pub directive: String,
    pub gitlab_domain: String,
    pub gitlab_project: String,
    pub api_token_env_var: String,
}

pub fn plan(
    children: &OrderedMap<Child>,
    directives: &[Directive],
    aggregate: &Aggregate,
) -> Result<Vec<Action>> {
    for directive in directives {
        if let Directive::Override { child, .. } = directive {
            if !children.contains_key(child) {
                return Err(Error::propagation(
                    child.as_str(),
                    format!(
                        "no such child, expected one of: {}",
                        children.keys().join(", ")
                    ),
                ));
            }
        }
    }

    if directives.contains(&Directive::Disable) {
        info!("propagation disabled by directive");
        return Ok(Vec::new());
    }
    if aggregate.empty {
        info!("nothing to build, nothing to propagate");
        return Ok(Vec::new());
    }

    let mut actions = Vec::new();
    for (name, child) in children.iter() {
        let overridden = directives.iter().rev().find_map(|directive| match directive {
            Directive::Override { child, mode } if child == name => Some(mode),
            _ => None,
        });
        let mode = match overridden {
            Some(mode) => {
                debug!("{name}: using directive {mode}");
                Some(mode)
            }
            None => rules::first_match(&child.strategy, aggregate)
                .map_err(|error| Error::propagation(name, error.to_string()))?,
        };

        let directive = match mode {
            Some(mode) => mode
                .directive(&aggregate.context)
                .map_err(|error| Error::propagation(name, error.to_string()))?,
            None => None,
        };
        match directive {
            Some(directive) => {
                info!("{name}: will trigger {directive}");
                actions.push(Action {
                    child: name.to_owned(),
                    directive,
                    gitlab_domain: child.gitlab_domain.clone(),
                    gitlab_project: child.gitlab_project.clone(),
                    api_token_env_var: child.api_token_env_var.clone(),
                });
            }
            None => info!("{name}: no propagation"),
        }
    }
    Ok(actions)
}
