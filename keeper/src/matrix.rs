use std::fmt;

use itertools::Itertools;
use serde::de;

use crate::{
    error::{Error, Result},
    ordered::{Assignment, OrderedMap},
};

/// The derived axis used for comparisons in predicates, never as a build dimension.
pub const DEFAULT_AXIS: &str = "default";

/// A string, integer or boolean YAML scalar read as a string.
///
/// Floating point numbers are rejected because their text does not survive the round trip, `8.10`
/// would read as `8.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar(pub String);

impl<'de> serde::Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ScalarVisitor;

        impl de::Visitor<'_> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string, an integer or a boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Scalar, E> {
                Ok(Scalar(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Scalar, E> {
                Ok(Scalar(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Scalar, E> {
                Ok(Scalar(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Scalar, E> {
                Err(E::custom(format_args!(
                    "the number {v} must be quoted, otherwise trailing zeros are lost"
                )))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

/// Named axes of variation, each an ordered non-empty list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix(OrderedMap<Vec<String>>);

impl Matrix {
    pub fn new(axes: OrderedMap<Vec<String>>) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::configuration("the matrix has no axes"));
        }
        for (name, values) in axes.iter() {
            if values.is_empty() {
                return Err(Error::configuration(format!("the matrix axis {name:?} has no values")));
            }
            if let Some(duplicate) = values.iter().duplicates().next() {
                return Err(Error::configuration(format!(
                    "the matrix axis {name:?} lists {duplicate:?} more than once"
                )));
            }
        }
        if let Some(values) = axes.get(DEFAULT_AXIS) {
            if values.len() != 1 {
                return Err(Error::configuration(format!(
                    "the {DEFAULT_AXIS:?} axis must have exactly one value, found {}",
                    values.len()
                )));
            }
        }
        Ok(Self(axes))
    }

    pub fn axes(&self) -> &OrderedMap<Vec<String>> {
        &self.0
    }

    /// The number of instances the expansion yields.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cartesian product of all axes, produced lazily, with the first authored axis varying
    /// fastest.
    pub fn expand(&self) -> impl Iterator<Item = Assignment> + '_ {
        let names = self.0.keys().collect::<Vec<_>>();
        self.0
            .values()
            .rev()
            .map(|values| values.iter())
            .multi_cartesian_product()
            .map(move |mut values| {
                values.reverse();
                names
                    .iter()
                    .zip(values)
                    .map(|(name, value)| (*name, value.as_str()))
                    .collect::<Assignment>()
            })
    }
}

/// The distinct values taken by every non-`default` axis across `assignments`, in first-seen order.
pub fn group<'a>(assignments: impl IntoIterator<Item = &'a Assignment>) -> OrderedMap<Vec<String>> {
    let mut grouped = OrderedMap::<Vec<String>>::default();
    for assignment in assignments {
        for (axis, value) in assignment.iter() {
            if axis == DEFAULT_AXIS {
                continue;
            }
            let mut values = grouped.get(axis).cloned().unwrap_or_default();
            if !values.contains(value) {
                values.push(value.clone());
                grouped.insert(axis.to_owned(), values);
            }
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(yaml: &str) -> Result<Matrix> {
        let axes: OrderedMap<Vec<Scalar>> = serde_yaml::from_str(yaml).unwrap();
        Matrix::new(
            axes.into_iter()
                .map(|(axis, values)| (axis, values.into_iter().map(|s| s.0).collect::<Vec<_>>()))
                .collect(),
        )
    }

    #[test]
    fn first_axis_varies_fastest() {
        let matrix = matrix(
            r#"
            default: ['4.13.1-flambda']
            base: ['4.13.1-flambda', '4.09.1-flambda']
            coq: ['8.18.0', '8.19.0']
            "#,
        )
        .unwrap();
        assert_eq!(matrix.len(), 4);
        let expansion = matrix.expand().map(|a| a.to_string()).collect::<Vec<_>>();
        assert_eq!(
            expansion,
            [
                "{default: 4.13.1-flambda, base: 4.13.1-flambda, coq: 8.18.0}",
                "{default: 4.13.1-flambda, base: 4.09.1-flambda, coq: 8.18.0}",
                "{default: 4.13.1-flambda, base: 4.13.1-flambda, coq: 8.19.0}",
                "{default: 4.13.1-flambda, base: 4.09.1-flambda, coq: 8.19.0}",
            ]
        );
    }

    #[test]
    fn grouping_reproduces_the_axes() {
        let matrix = matrix(
            r#"
            default: ['latest']
            base: ['latest', '4.14', '4.05']
            coq: ['dev', '8.18']
            extra: ['x']
            "#,
        )
        .unwrap();
        let expansion = matrix.expand().collect::<Vec<_>>();
        assert_eq!(expansion.len(), 6);
        assert!(expansion.iter().map(ToString::to_string).all_unique());

        let grouped = group(&expansion);
        assert_eq!(grouped.keys().collect::<Vec<_>>(), ["base", "coq", "extra"]);
        for (axis, values) in grouped.iter() {
            assert_eq!(Some(values), matrix.axes().get(axis));
        }
    }

    #[test]
    fn scalars_are_read_as_strings() {
        let matrix = matrix("n: [1, 2]\nflag: [true]\ns: ['8.10']").unwrap();
        assert_eq!(matrix.axes().get("n").unwrap(), &["1", "2"]);
        assert_eq!(matrix.axes().get("flag").unwrap(), &["true"]);
        assert_eq!(matrix.axes().get("s").unwrap(), &["8.10"]);

        let error = serde_yaml::from_str::<Vec<Scalar>>("[8.10]").unwrap_err();
        assert!(error.to_string().contains("must be quoted"), "{error}");
    }

    #[test]
    fn malformed_matrices() {
        assert!(matrix("{}").is_err());
        assert!(matrix("coq: []").is_err());
        assert!(matrix("coq: ['8.18', '8.18']").is_err());
        assert!(matrix("default: ['a', 'b']\nbase: ['a']").is_err());
    }
}
