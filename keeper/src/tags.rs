use std::collections::BTreeMap;

use image_reference::Tag;
use log::debug;

use crate::{
    catalog::TagSpec,
    error::{Error, Origin, Result},
    expr::Context,
};

/// Renders the tags whose condition holds, in authored order.
pub fn resolve(specs: &[TagSpec], context: &Context) -> Result<Vec<String>> {
    let mut tags = Vec::with_capacity(specs.len());
    for spec in specs {
        if !spec.condition.holds(context)? {
            debug!("skipping tag {}", spec.tag);
            continue;
        }
        let tag = spec.tag.render(context)?;
        let tag = Tag::new(tag).map_err(|error| Error::configuration(error.to_string()))?;
        tags.push(tag.into_string());
    }
    if tags.is_empty() {
        return Err(Error::configuration("no tag applies to this image"));
    }
    Ok(tags)
}

/// Every tag of the plan with the instance that produced it.
#[derive(Debug, Default)]
pub struct TagRegistry {
    owners: BTreeMap<String, Origin>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails when the tag was claimed before, including by the same instance.
    pub fn claim(&mut self, tag: &str, origin: &Origin) -> Result<()> {
        if let Some(first) = self.owners.get(tag) {
            return Err(Error::DuplicateTag {
                tag: tag.to_owned(),
                first: first.clone(),
                second: origin.clone(),
            });
        }
        self.owners.insert(tag.to_owned(), origin.clone());
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::Value, ordered::Assignment};

    fn context(matrix: &Assignment) -> Context {
        Context::new().with("matrix", Value::from(matrix))
    }

    fn specs(yaml: &str) -> Vec<TagSpec> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn conditional_tags() {
        let specs = specs(
            r#"
            - tag: '{matrix[coq]}'
              if: '{matrix[base]} == {matrix[default]}'
            - tag: 'latest'
              if: ['{matrix[base]} == {matrix[default]}', '{matrix[coq]} == 8.18.0']
            - tag: '{matrix[coq]}-ocaml-{matrix[base]}'
            "#,
        );
        let default: Assignment = [
            ("default", "4.13.1-flambda"),
            ("base", "4.13.1-flambda"),
            ("coq", "8.18.0"),
        ]
        .into_iter()
        .collect();
        let other: Assignment = [
            ("default", "4.13.1-flambda"),
            ("base", "4.09.1-flambda"),
            ("coq", "8.18.0"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            resolve(&specs, &context(&default)).unwrap(),
            ["8.18.0", "latest", "8.18.0-ocaml-4.13.1-flambda"]
        );
        assert_eq!(
            resolve(&specs, &context(&other)).unwrap(),
            ["8.18.0-ocaml-4.09.1-flambda"]
        );
    }

    #[test]
    fn an_image_needs_a_tag() {
        let specs = specs("- {tag: x, if: 'a == b'}");
        assert!(matches!(
            resolve(&specs, &Context::new()),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn tags_must_follow_the_docker_grammar() {
        let specs = specs("- {tag: '-{matrix[coq]}'}");
        let matrix: Assignment = [("coq", "8.18")].into_iter().collect();
        assert!(resolve(&specs, &context(&matrix)).is_err());
    }

    #[test]
    fn registry_reports_both_owners() {
        let mut registry = TagRegistry::new();
        let first: Assignment = [("coq", "8.18")].into_iter().collect();
        let second: Assignment = [("coq", "8.18.0")].into_iter().collect();
        registry.claim("8.18", &Origin::instance(0, &first)).unwrap();
        let error = registry.claim("8.18", &Origin::instance(3, &second)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "duplicate tag \"8.18\": produced by images[0] with matrix {coq: 8.18} and by images[3] \
             with matrix {coq: 8.18.0}, every tag must belong to exactly one image"
        );
        assert_eq!(registry.len(), 1);
    }
}
