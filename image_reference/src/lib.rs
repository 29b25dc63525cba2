//! Repository and tag types based on the grammar of
//! [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go):
//!
//! ```go
//! // name                            := [domain '/'] path-component ['/' path-component]*
//! // domain                          := domain-component ['.' domain-component]* [':' port-number]
//! // domain-component                := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! // port-number                     := /[0-9]+/
//! // path-component                  := alpha-numeric [separator alpha-numeric]*
//! // alpha-numeric                   := /[a-z0-9]+/
//! // separator                       := /[_.]|__|[-]*/
//! //
//! // tag                             := /[\w][\w.-]{0,127}/
//! ```
//!
//! A catalog names one repository and many tags. Both are validated once, when they enter the
//! program, so that every image reference written into a pipeline is well-formed.

use std::{fmt, ops::Range, str::FromStr, sync::LazyLock};

#[cfg(feature = "serde")]
use ::serde::{Deserialize, Deserializer, Serialize, Serializer};
use regex::Regex;

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidRepository(String);

impl std::error::Error for InvalidRepository {}

impl fmt::Display for InvalidRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid repository name: {:?}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidTag(String);

impl std::error::Error for InvalidTag {}

impl fmt::Display for InvalidTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid tag {:?}: expected at most 128 ASCII letters, digits, underscores, dots or \
             dashes, not starting with a dot or dash",
            self.0
        )
    }
}

/// Byte offsets into the repository buffer.
#[derive(Copy, Clone, Debug)]
struct Indices {
    // NOTE: the domain always starts at 0.
    domain_end: Option<usize>,
    path_start: usize,
}

impl Indices {
    fn parse(s: &str) -> Option<Self> {
        static REPOSITORY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(concat!(
                r"^",
                r"(?:(?P<registry>[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)+(?::[0-9]+)?)\/)?",
                r"(?P<path>[a-z0-9]+(?:(?:[_.]|__|[-]*)[a-z0-9]+)*(?:\/[a-z0-9]+(?:(?:[_.]|__|[-]*)[a-z0-9]+)*)*)",
                r"$"
            ))
            .unwrap()
        });

        let captures = REPOSITORY_REGEX.captures(s)?;
        Some(Self {
            domain_end: captures.name("registry").map(|m| m.end()),
            path_start: captures.name("path")?.start(),
        })
    }

    fn registry_range(&self) -> Option<Range<usize>> {
        self.domain_end.map(|end| 0..end)
    }
}

/// A repository name, written as `<registry>/<path>` where only `<path>` is required. On Docker
/// Hub, the path is `<namespace>/<name>`.
#[derive(Clone)]
pub struct Repository {
    buffer: String,
    indices: Indices,
}

impl Repository {
    pub fn new(value: String) -> Result<Self, InvalidRepository> {
        match Indices::parse(&value) {
            Some(indices) => Ok(Self {
                buffer: value,
                indices,
            }),
            None => Err(InvalidRepository(value)),
        }
    }

    /// Returns the `<registry>` section, if present.
    pub fn registry(&self) -> Option<&str> {
        self.indices
            .registry_range()
            .map(|range| &self.buffer[range])
    }

    /// Returns the `<path>` section. This is the only required section.
    pub fn path(&self) -> &str {
        &self.buffer[self.indices.path_start..]
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
    }
}

impl Eq for Repository {}

impl std::ops::Deref for Repository {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.buffer.fmt(f)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.buffer.fmt(f)
    }
}

impl FromStr for Repository {
    type Err = InvalidRepository;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Repository {
    type Error = InvalidRepository;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(feature = "serde")]
impl Serialize for Repository {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.buffer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Repository {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::new(Deserialize::deserialize(deserializer)?).map_err(::serde::de::Error::custom)
    }
}

/// A validated image tag.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    pub fn new(value: String) -> Result<Self, InvalidTag> {
        // `\w` is ASCII in the reference grammar, Unicode in `regex`.
        static TAG_REGEX: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap());

        if TAG_REGEX.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidTag(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::ops::Deref for Tag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Tag {
    type Err = InvalidTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.0
    }
}

#[cfg(feature = "serde")]
impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::new(Deserialize::deserialize(deserializer)?).map_err(::serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_parsing_works() {
        {
            let repo: Repository = "coqorg/coq".parse().unwrap();
            assert_eq!(repo.registry(), None);
            assert_eq!(repo.path(), "coqorg/coq");
        }

        {
            let repo: Repository = "registry.gitlab.com:5050/math-comp/docker-mathcomp"
                .parse()
                .unwrap();
            assert_eq!(repo.registry(), Some("registry.gitlab.com:5050"));
            assert_eq!(repo.path(), "math-comp/docker-mathcomp");
        }

        {
            assert!("Coqorg/coq".parse::<Repository>().is_err()); // uppercase path.
            assert!("coqorg/coq:latest".parse::<Repository>().is_err()); // tags are separate.
            assert!("".parse::<Repository>().is_err());
        }
    }

    #[test]
    fn tag_validation_works() {
        assert!("8.18.0-ocaml-4.13.1-flambda".parse::<Tag>().is_ok());
        assert!("dev".parse::<Tag>().is_ok());
        assert!("latest_v2".parse::<Tag>().is_ok());
        assert!(".hidden".parse::<Tag>().is_err());
        assert!("-dash".parse::<Tag>().is_err());
        assert!("with space".parse::<Tag>().is_err());
        assert!("café".parse::<Tag>().is_err());
        assert!("８".parse::<Tag>().is_err());
        assert!("a".repeat(129).parse::<Tag>().is_err());
        assert!("a".repeat(128).parse::<Tag>().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn repository_serde_works() {
        let des: Repository = "coqorg/coq".parse().unwrap();
        let ser = r#""coqorg/coq""#;
        assert_eq!(serde_json::to_string(&des).unwrap(), ser);
        assert_eq!(serde_json::from_str::<Repository>(ser).unwrap(), des);
        assert!(serde_json::from_str::<Repository>(r#""Not/Valid""#).is_err());
    }
}
