//! Placeholder templates such as `{matrix[coq][%.*]}-ocaml-{matrix[base]}`.
//!
//! A placeholder is a path into a [`Context`] followed by zero or more bash-like transforms, each
//! in its own pair of brackets:
//!
//! | transform    | effect                                                       |
//! |--------------|--------------------------------------------------------------|
//! | `[%glob]`    | remove the shortest suffix matching `glob`                   |
//! | `[%%glob]`   | remove the longest suffix matching `glob`                    |
//! | `[#glob]`    | remove the shortest prefix matching `glob`; on a list, join with `glob` |
//! | `[##glob]`   | remove the longest prefix matching `glob`                    |
//! | `[//old/new]`| replace the first match of glob `old` with `new`             |
//! | `[/#/sep]`   | split a string on `sep`                                      |
//! | `[a:b]`      | characters `a` (inclusive) to `b` (exclusive)                |
//!
//! Any other bracket is a lookup, as is `.key`. Transforms apply element-wise to lists, except
//! for the join. `{{` and `}}` stand for literal braces.

mod glob;
mod value;

use std::{fmt, str::FromStr};

pub use glob::Glob;
pub use value::{Context, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    UnbalancedBrace,
    EmptyPlaceholder,
    MalformedPath(String),
    UnknownTransform(String),
    MissingKey { path: String, key: String },
    NotIndexable { path: String, kind: &'static str },
    NotTransformable { path: String, kind: &'static str },
    NotAString { path: String, kind: &'static str },
    NotASinglePlaceholder,
    MalformedPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub source: String,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {:?}: ", self.source)?;
        match &self.kind {
            ErrorKind::UnbalancedBrace => {
                f.write_str("unbalanced brace, use `{{` or `}}` for literal braces")
            }
            ErrorKind::EmptyPlaceholder => f.write_str("empty placeholder `{}`"),
            ErrorKind::MalformedPath(path) => write!(f, "malformed path {path:?}"),
            ErrorKind::UnknownTransform(transform) => write!(f, "unknown transform [{transform}]"),
            ErrorKind::MissingKey { path, key } => write!(f, "{path} has no key {key:?}"),
            ErrorKind::NotIndexable { path, kind } => {
                write!(f, "{path} is a {kind} and can not be indexed")
            }
            ErrorKind::NotTransformable { path, kind } => {
                write!(f, "{path} is a {kind} and can not be transformed")
            }
            ErrorKind::NotAString { path, kind } => write!(
                f,
                "{path} is a {kind} but a string is required here (join a list with [#sep])"
            ),
            ErrorKind::NotASinglePlaceholder => {
                f.write_str("expected exactly one placeholder and nothing else")
            }
            ErrorKind::MalformedPredicate => {
                f.write_str("expected a condition of the form `lhs == rhs` or `lhs != rhs`")
            }
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Transform {
    Slice { start: usize, end: usize },
    StripSuffix { glob: Glob, longest: bool },
    /// `#text`: a prefix removal on strings, a join on lists.
    Hash { text: String, glob: Glob, longest: bool },
    Replace { glob: Glob, with: String },
    Split { separator: String },
}

impl Transform {
    /// Returns `Ok(None)` when the bracket is a lookup rather than a transform.
    fn parse(content: &str) -> Result<Option<Self>, ErrorKind> {
        let unknown = || ErrorKind::UnknownTransform(content.to_owned());
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_owned()).ok_or_else(unknown);

        let transform = if let Some(glob) = content.strip_prefix("%%") {
            Transform::StripSuffix {
                glob: Glob::new(&non_empty(glob)?),
                longest: true,
            }
        } else if let Some(glob) = content.strip_prefix('%') {
            Transform::StripSuffix {
                glob: Glob::new(&non_empty(glob)?),
                longest: false,
            }
        } else if let Some(separator) = content.strip_prefix("/#/") {
            Transform::Split {
                separator: non_empty(separator)?,
            }
        } else if let Some(rest) = content.strip_prefix("//") {
            let (glob, with) = rest.split_once('/').ok_or_else(unknown)?;
            Transform::Replace {
                glob: Glob::new(&non_empty(glob)?),
                with: with.to_owned(),
            }
        } else if let Some(text) = content.strip_prefix('#') {
            let text = non_empty(text)?;
            let (glob, longest) = match text.strip_prefix('#') {
                Some(glob) if !glob.is_empty() => (glob, true),
                _ => (text.as_str(), false),
            };
            Transform::Hash {
                glob: Glob::new(glob),
                longest,
                text,
            }
        } else if let Some((start, end)) = content.split_once(':') {
            Transform::Slice {
                start: start.parse().map_err(|_| unknown())?,
                end: end.parse().map_err(|_| unknown())?,
            }
        } else if content.starts_with('/') {
            return Err(unknown());
        } else {
            return Ok(None);
        };
        Ok(Some(transform))
    }

    fn apply_str(&self, s: &str) -> Value {
        match self {
            Transform::Slice { start, end } => Value::Str(
                s.chars()
                    .skip(*start)
                    .take(end.saturating_sub(*start))
                    .collect(),
            ),
            Transform::StripSuffix { glob, longest } => {
                Value::Str(glob.strip_suffix(s, *longest).to_owned())
            }
            Transform::Hash { glob, longest, .. } => {
                Value::Str(glob.strip_prefix(s, *longest).to_owned())
            }
            Transform::Replace { glob, with } => Value::Str(glob.replace_first(s, with)),
            Transform::Split { separator } => {
                Value::List(s.split(separator.as_str()).map(str::to_owned).collect())
            }
        }
    }

    fn apply(&self, value: Value, path: &str) -> Result<Value, ErrorKind> {
        match value {
            Value::Str(s) => Ok(self.apply_str(&s)),
            Value::List(list) => Ok(match self {
                Transform::Hash { text, .. } => Value::Str(list.join(text)),
                _ => Value::List(
                    list.iter()
                        .flat_map(|s| match self.apply_str(s) {
                            Value::Str(s) => vec![s],
                            Value::List(list) => list,
                            Value::Map(_) => {
                                unreachable!("string transforms never produce mappings")
                            }
                        })
                        .collect(),
                ),
            }),
            Value::Map(_) => Err(ErrorKind::NotTransformable {
                path: path.to_owned(),
                kind: "mapping",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Transform(Transform),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    text: String,
    root: String,
    steps: Vec<Step>,
}

impl Placeholder {
    fn parse(text: &str) -> Result<Self, ErrorKind> {
        if text.is_empty() {
            return Err(ErrorKind::EmptyPlaceholder);
        }
        let malformed = || ErrorKind::MalformedPath(text.to_owned());

        let root_end = text.find(['.', '[']).unwrap_or(text.len());
        let root = &text[..root_end];
        if root.is_empty() || root.contains([']', ' ']) {
            return Err(malformed());
        }

        let mut steps = Vec::new();
        let mut rest = &text[root_end..];
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(malformed)?;
                let content = &after[..close];
                if content.is_empty() {
                    return Err(malformed());
                }
                steps.push(match Transform::parse(content)? {
                    Some(transform) => Step::Transform(transform),
                    None => Step::Key(content.to_owned()),
                });
                rest = &after[close + 1..];
            } else if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return Err(malformed());
                }
                steps.push(Step::Key(after[..end].to_owned()));
                rest = &after[end..];
            } else {
                return Err(malformed());
            }
        }

        Ok(Self {
            text: text.to_owned(),
            root: root.to_owned(),
            steps,
        })
    }

    fn resolve(&self, context: &Context) -> Result<Value, ErrorKind> {
        let mut path = self.root.clone();
        let mut value = context
            .get(&self.root)
            .cloned()
            .ok_or_else(|| ErrorKind::MissingKey {
                path: "the context".to_owned(),
                key: self.root.clone(),
            })?;

        for step in &self.steps {
            value = match step {
                Step::Key(key) => {
                    let next = match &value {
                        Value::Map(map) => map.get(key).cloned(),
                        Value::List(list) => match key.parse::<usize>() {
                            Ok(index) => list.get(index).cloned().map(Value::Str),
                            Err(_) => {
                                return Err(ErrorKind::NotIndexable {
                                    path,
                                    kind: value.kind(),
                                })
                            }
                        },
                        Value::Str(_) => {
                            return Err(ErrorKind::NotIndexable {
                                path,
                                kind: value.kind(),
                            })
                        }
                    };
                    let next = next.ok_or_else(|| ErrorKind::MissingKey {
                        path: path.clone(),
                        key: key.clone(),
                    })?;
                    path.push('[');
                    path.push_str(key);
                    path.push(']');
                    next
                }
                Step::Transform(transform) => transform.apply(value, &path)?,
            };
        }

        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed template. Parsing checks the syntax, evaluation checks the paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, Error> {
        let error = |kind| Error {
            source: source.to_owned(),
            kind,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((index, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, c)| c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, c)| c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(error(ErrorKind::UnbalancedBrace)),
                '{' => {
                    let start = index + 1;
                    let mut in_bracket = false;
                    let end = loop {
                        match chars.next() {
                            Some((_, '[')) if !in_bracket => in_bracket = true,
                            Some((_, ']')) if in_bracket => in_bracket = false,
                            Some((end, '}')) if !in_bracket => break end,
                            Some((_, '{')) if !in_bracket => {
                                return Err(error(ErrorKind::UnbalancedBrace))
                            }
                            Some(_) => {}
                            None => return Err(error(ErrorKind::UnbalancedBrace)),
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(
                        Placeholder::parse(&source[start..end]).map_err(error)?,
                    ));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error {
            source: self.source.clone(),
            kind,
        }
    }

    /// Evaluates every placeholder, each of which must produce a string.
    pub fn render(&self, context: &Context) -> Result<String, Error> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(placeholder) => {
                    match placeholder.resolve(context).map_err(|kind| self.error(kind))? {
                        Value::Str(s) => out.push_str(&s),
                        other => {
                            return Err(self.error(ErrorKind::NotAString {
                                path: placeholder.text.clone(),
                                kind: other.kind(),
                            }))
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Evaluates a template made of exactly one placeholder to whatever value it produces.
    pub fn evaluate(&self, context: &Context) -> Result<Value, Error> {
        match self.segments.as_slice() {
            [Segment::Placeholder(placeholder)] => {
                placeholder.resolve(context).map_err(|kind| self.error(kind))
            }
            _ => Err(self.error(ErrorKind::NotASinglePlaceholder)),
        }
    }

    /// A single placeholder evaluates to its value as a list; any other template renders to a
    /// list of one string.
    pub fn evaluate_list(&self, context: &Context) -> Result<Vec<String>, Error> {
        match self.segments.as_slice() {
            [Segment::Placeholder(placeholder)] => {
                let value = self.evaluate(context)?;
                let kind = value.kind();
                value.into_list().ok_or_else(|| {
                    self.error(ErrorKind::NotAString {
                        path: placeholder.text.clone(),
                        kind,
                    })
                })
            }
            _ => Ok(vec![self.render(context)?]),
        }
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Template {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl<'de> serde::Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
}

/// `lhs == rhs` or `lhs != rhs`. Both sides are trimmed and stripped of double quotes before
/// they are rendered, so `"{matrix[base]}" == "latest"` and `{matrix[base]}==latest` agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    source: String,
    lhs: Template,
    comparison: Comparison,
    rhs: Template,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self, Error> {
        let malformed = || Error {
            source: source.to_owned(),
            kind: ErrorKind::MalformedPredicate,
        };

        let (comparison, operator) = if source.contains("==") {
            (Comparison::Equal, "==")
        } else if source.contains("!=") {
            (Comparison::NotEqual, "!=")
        } else {
            return Err(malformed());
        };

        let mut sides = source.split(operator);
        let (Some(lhs), Some(rhs), None) = (sides.next(), sides.next(), sides.next()) else {
            return Err(malformed());
        };
        let side = |s: &str| Template::parse(&s.trim().replace('"', ""));

        Ok(Self {
            source: source.to_owned(),
            lhs: side(lhs)?,
            comparison,
            rhs: side(rhs)?,
        })
    }

    pub fn holds(&self, context: &Context) -> Result<bool, Error> {
        let lhs = self.lhs.render(context)?;
        let rhs = self.rhs.render(context)?;
        Ok(match self.comparison {
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
        })
    }
}

impl<'de> serde::Deserialize<'de> for Predicate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// The `if` of a tag or an after-deploy script: absent, one predicate, or a list of predicates
/// that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition(Vec<Predicate>);

impl Condition {
    pub fn all(predicates: Vec<Predicate>) -> Self {
        Self(predicates)
    }

    pub fn holds(&self, context: &Context) -> Result<bool, Error> {
        for predicate in &self.0 {
            if !predicate.holds(context)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<'de> serde::Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ConditionVisitor;

        impl<'de> serde::de::Visitor<'de> for ConditionVisitor {
            type Value = Condition;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a condition or a list of conditions")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Condition, E> {
                Ok(Condition::default())
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Condition, E> {
                Predicate::parse(v)
                    .map(|predicate| Condition(vec![predicate]))
                    .map_err(E::custom)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Condition, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut predicates = Vec::new();
                while let Some(predicate) = seq.next_element()? {
                    predicates.push(predicate);
                }
                Ok(Condition(predicates))
            }
        }

        deserializer.deserialize_any(ConditionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn matrix(entries: &[(&str, &str)]) -> Context {
        Context::new().with(
            "matrix",
            Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::from(*v)))
                    .collect(),
            ),
        )
    }

    fn render(template: &str, context: &Context) -> String {
        Template::parse(template).unwrap().render(context).unwrap()
    }

    #[test]
    fn transforms_compile_their_globs_once() {
        assert_eq!(
            Transform::parse("##*.").unwrap(),
            Some(Transform::Hash {
                text: "#*.".to_owned(),
                glob: Glob::new("*."),
                longest: true,
            })
        );
        assert_eq!(
            Transform::parse("#").unwrap_err(),
            ErrorKind::UnknownTransform("#".to_owned())
        );
        assert_eq!(
            Transform::parse("//8.*/9").unwrap(),
            Some(Transform::Replace {
                glob: Glob::new("8.*"),
                with: "9".to_owned(),
            })
        );
    }

    #[test]
    fn bash_like_transforms() {
        let context = Context::new()
            .with("var", "abcde")
            .with("s", "1234567890abcdef")
            .with("v", "8.10.0")
            .with("pi", "3.14159");
        assert_eq!(render("A{var[2:4]}Z", &context), "AcdZ");
        assert_eq!(render("{s[0:7]}", &context), "1234567");
        assert_eq!(render("{v[%.*]}", &context), "8.10");
        assert_eq!(render("{v[%%.*]}", &context), "8");
        assert_eq!(render("{pi[%???]}", &context), "3.14");
        assert_eq!(render("{v[#*.]}", &context), "10.0");
        assert_eq!(render("{v[##*.]}", &context), "0");
        assert_eq!(render("{var[0:100]}", &context), "abcde");
        assert_eq!(render("{var[4:2]}", &context), "");
    }

    #[test]
    fn version_abbreviations() {
        assert_eq!(render("{matrix[coq][%.*]}", &matrix(&[("coq", "8.18.0")])), "8.18");
        assert_eq!(render("{matrix[coq][//pl/.]}", &matrix(&[("coq", "8.5pl3")])), "8.5.3");
        assert_eq!(
            render("{matrix[coq][//pl/.][%.*]}", &matrix(&[("coq", "8.5pl3")])),
            "8.5"
        );
        assert_eq!(
            render("{matrix[base][%.*-*]}", &matrix(&[("base", "4.13.1-flambda")])),
            "4.13"
        );
        assert_eq!(
            render("V{matrix[coq][//-/+]}", &matrix(&[("coq", "8.12-alpha")])),
            "V8.12+alpha"
        );
    }

    #[test]
    fn replacement_with_empty_text_deletes_the_match() {
        let flag = "--enable-foo{matrix[base][//4.05.0/]}";
        assert_eq!(render(flag, &matrix(&[("base", "4.05.0")])), "--enable-foo");
        assert_eq!(render(flag, &matrix(&[("base", "4.07.1")])), "--enable-foo4.07.1");
    }

    #[test]
    fn dotted_and_bracketed_paths_agree() {
        let context = Context::new().with(
            "defaults",
            Value::Map(BTreeMap::from([(
                "build_date".to_owned(),
                Value::from("2024-01-01T00:00:00Z"),
            )])),
        );
        assert_eq!(render("{defaults.build_date}", &context), "2024-01-01T00:00:00Z");
        assert_eq!(render("{defaults[build_date]}", &context), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn literal_braces() {
        assert_eq!(render("{{x}} ${{HOME}}", &Context::new()), "{x} ${HOME}");
    }

    #[test]
    fn lists_join_split_and_map() {
        let context = Context::new()
            .with("keywords", vec!["dev".to_owned(), "8.18".to_owned()])
            .with("items", "a,b,c");
        assert_eq!(render("{keywords[#,]}", &context), "dev,8.18");
        assert_eq!(render("{keywords[//./-][#;]}", &context), "dev;8-18");
        assert_eq!(render("{items[/#/,][#+]}", &context), "a+b+c");
        assert_eq!(render("{keywords[1]}", &context), "8.18");
        assert_eq!(
            Template::parse("{items[/#/,]}").unwrap().evaluate_list(&context).unwrap(),
            ["a", "b", "c"]
        );
        assert_eq!(
            Template::parse("v{items}").unwrap().evaluate_list(&context).unwrap(),
            ["va,b,c"]
        );
    }

    #[test]
    fn rendering_is_idempotent() {
        let context = matrix(&[("coq", "8.18.0"), ("base", "4.13.1-flambda")]);
        let template = Template::parse("{matrix[coq][%.*]}-ocaml-{matrix[base]}").unwrap();
        let first = template.render(&context).unwrap();
        let second = template.render(&context).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "8.18-ocaml-4.13.1-flambda");
    }

    #[test]
    fn unresolvable_paths_fail() {
        let context = matrix(&[("coq", "8.18.0")]);
        let error = Template::parse("{matrix[ocaml]}").unwrap().render(&context).unwrap_err();
        assert_eq!(
            error.kind,
            ErrorKind::MissingKey {
                path: "matrix".to_owned(),
                key: "ocaml".to_owned()
            }
        );

        let error = Template::parse("{matrix}").unwrap().render(&context).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::NotAString { .. }));

        let error = Template::parse("{nothing}").unwrap().render(&context).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::MissingKey { .. }));

        let error = Template::parse("{matrix[coq][0]}").unwrap().render(&context).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::NotIndexable { .. }));
    }

    #[test]
    fn syntax_errors() {
        let kind = |s: &str| Template::parse(s).unwrap_err().kind;
        assert_eq!(kind("{a"), ErrorKind::UnbalancedBrace);
        assert_eq!(kind("a}"), ErrorKind::UnbalancedBrace);
        assert_eq!(kind("{}"), ErrorKind::EmptyPlaceholder);
        assert_eq!(kind("{a[%]}"), ErrorKind::UnknownTransform("%".to_owned()));
        assert_eq!(kind("{a[//x]}"), ErrorKind::UnknownTransform("//x".to_owned()));
        assert_eq!(kind("{a[1:x]}"), ErrorKind::UnknownTransform("1:x".to_owned()));
        assert_eq!(kind("{a[/x]}"), ErrorKind::UnknownTransform("/x".to_owned()));
        assert!(matches!(kind("{a[}"), ErrorKind::UnbalancedBrace));
        assert!(matches!(kind("{a..b}"), ErrorKind::MalformedPath(_)));
    }

    #[test]
    fn brackets_may_contain_closing_braces() {
        let context = Context::new().with("s", "a}b");
        assert_eq!(render("{s[//}/-]}", &context), "a-b");
    }

    #[test]
    fn predicates() {
        let latest = matrix(&[("base", "latest"), ("default", "latest")]);
        let other = matrix(&[("base", "4.09.0-flambda"), ("default", "latest")]);
        let holds = |p: &str, c: &Context| Predicate::parse(p).unwrap().holds(c).unwrap();

        assert!(holds(r#"{matrix[base]}=="latest""#, &latest));
        assert!(holds(r#"{matrix[base]} == "latest""#, &latest));
        assert!(holds(r#" "{matrix[base]}" == "latest""#, &latest));
        assert!(holds("{matrix[base]} == {matrix[default]}", &latest));
        assert!(holds(r#"{matrix[base]}!="latest""#, &other));
        assert!(holds(r#"{matrix[base]} != "latest""#, &other));
        assert!(!holds("{matrix[base]} == {matrix[default]}", &other));

        assert!(Predicate::parse("{matrix[base]}").is_err());
        assert!(Predicate::parse("a == b == c").is_err());
    }

    #[test]
    fn conditions() {
        let context = matrix(&[("base", "latest"), ("coq", "dev")]);
        let condition = |yaml: &str| serde_yaml::from_str::<Condition>(yaml).unwrap();

        assert!(Condition::default().holds(&context).unwrap());
        assert!(condition("~").holds(&context).unwrap());
        assert!(condition("'{matrix[base]} == latest'").holds(&context).unwrap());
        assert!(condition("['{matrix[base]} == latest', '{matrix[coq]} == dev']")
            .holds(&context)
            .unwrap());
        assert!(!condition("['{matrix[base]} == latest', '{matrix[coq]} != dev']")
            .holds(&context)
            .unwrap());
        assert!(serde_yaml::from_str::<Condition>("'{matrix[base]}'").is_err());
    }
}
