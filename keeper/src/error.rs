use std::{fmt, io, path::PathBuf};

use crate::ordered::Assignment;

/// Locates a build instance inside the catalog: the index of its entry under `images` and the
/// matrix values it was expanded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub entry: usize,
    pub matrix: Option<Assignment>,
}

impl Origin {
    pub fn entry(entry: usize) -> Self {
        Self {
            entry,
            matrix: None,
        }
    }

    pub fn instance(entry: usize, matrix: &Assignment) -> Self {
        Self {
            entry,
            matrix: Some(matrix.clone()),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "images[{}]", self.entry)?;
        if let Some(matrix) = &self.matrix {
            write!(f, " with matrix {matrix}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum Error {
    /// The catalog is malformed, or a template can not be evaluated.
    Configuration {
        origin: Option<Origin>,
        message: String,
    },
    /// Two build instances claim the same tag.
    DuplicateTag {
        tag: String,
        first: Origin,
        second: Origin,
    },
    /// Listing remote tags or resolving an upstream commit failed.
    RemoteFetch { url: String, message: String },
    /// A propagation strategy or directive is malformed.
    Propagation { child: String, message: String },
    Io { path: PathBuf, source: io::Error },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            origin: None,
            message: message.into(),
        }
    }

    pub fn propagation(child: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Propagation {
            child: child.into(),
            message: message.into(),
        }
    }

    pub fn remote_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attaches the origin to a configuration error that does not have one yet. A more precise
    /// origin, one that carries matrix values, replaces a less precise one.
    pub fn within(self, at: &Origin) -> Self {
        match self {
            Self::Configuration { origin, message } => {
                let origin = match origin {
                    Some(origin) if origin.matrix.is_some() || at.matrix.is_none() => origin,
                    _ => at.clone(),
                };
                Self::Configuration {
                    origin: Some(origin),
                    message,
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { origin, message } => {
                f.write_str("configuration error")?;
                if let Some(origin) = origin {
                    write!(f, " in {origin}")?;
                }
                write!(f, ": {message}")
            }
            Error::DuplicateTag { tag, first, second } => write!(
                f,
                "duplicate tag {tag:?}: produced by {first} and by {second}, \
                 every tag must belong to exactly one image"
            ),
            Error::RemoteFetch { url, message } => {
                write!(f, "failed to fetch {url}: {message}")
            }
            Error::Propagation { child, message } => {
                write!(f, "propagation to {child:?}: {message}")
            }
            Error::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<crate::expr::Error> for Error {
    fn from(error: crate::expr::Error) -> Self {
        Error::configuration(error.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_prefers_the_most_precise_origin() {
        let matrix: Assignment = [("coq", "8.18.0")].into_iter().collect();

        let error = Error::configuration("bad").within(&Origin::entry(2));
        assert_eq!(error.to_string(), "configuration error in images[2]: bad");

        let error = error.within(&Origin::instance(2, &matrix));
        assert_eq!(
            error.to_string(),
            "configuration error in images[2] with matrix {coq: 8.18.0}: bad"
        );

        let error = error.within(&Origin::entry(2));
        assert_eq!(
            error.to_string(),
            "configuration error in images[2] with matrix {coq: 8.18.0}: bad"
        );
    }

    #[test]
    fn within_leaves_other_errors_alone() {
        let error = Error::remote_fetch("https://example.com", "404").within(&Origin::entry(0));
        assert!(matches!(error, Error::RemoteFetch { .. }));
    }
}
