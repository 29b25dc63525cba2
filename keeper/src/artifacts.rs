//! The files `write-artifacts` leaves in the output directory, and the reading back of the ones
//! `generate-config` needs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{Error, Result},
    instance::Instance,
    plan::Plan,
    propagate::Action,
};

pub const BUILD_DATA_ALL: &str = "build_data_all.json";
pub const BUILD_DATA_CHOSEN: &str = "build_data_chosen.json";
pub const BUILD_DATA_MIN: &str = "build_data_min.json";
pub const REMOTE_TAGS: &str = "remote_tags.txt";
pub const REMOTE_TAGS_TO_RM: &str = "remote_tags_to_rm.json";
pub const DOCKERFILES: &str = "Dockerfiles.txt";
pub const DOCKER_REPO: &str = "docker_repo.txt";
pub const PROPAGATE: &str = "propagate.json";
pub const README: &str = "README.md";

const README_MARKER: &str = "<!-- tags -->";

pub struct Artifacts {
    dir: PathBuf,
}

impl Artifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every artifact of the plan. The README is generated from `readme_template` when the
    /// catalog has a `base_url` and the template exists.
    pub fn write(&self, plan: &Plan, readme_template: &Path) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|error| Error::io(&self.dir, error))?;

        self.write_json(BUILD_DATA_ALL, &plan.all)?;
        self.write_json(BUILD_DATA_CHOSEN, &plan.chosen)?;
        self.write_json(BUILD_DATA_MIN, &plan.outdated)?;
        self.write_lines(REMOTE_TAGS, plan.remote_tags.iter().map(String::as_str))?;
        self.write_json(REMOTE_TAGS_TO_RM, &plan.to_remove)?;
        self.write_lines(
            DOCKERFILES,
            plan.all.iter().map(|instance| instance.path.as_str()).unique(),
        )?;
        self.write_text(DOCKER_REPO, &format!("{}\n", plan.docker_repo))?;
        self.write_json(PROPAGATE, &plan.propagate)?;

        match &plan.base_url {
            Some(base_url) => self.write_readme(readme_template, base_url, &plan.all)?,
            None => warn!("the catalog has no base_url, skipping {README}"),
        }
        Ok(())
    }

    fn write_readme(&self, template: &Path, base_url: &str, instances: &[Instance]) -> Result<()> {
        let template_text = match fs::read_to_string(template) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} does not exist, skipping {README}", template.display());
                return Ok(());
            }
            Err(error) => return Err(Error::io(template, error)),
        };
        if !template_text.contains(README_MARKER) {
            warn!("{} has no {README_MARKER} marker", template.display());
        }
        self.write_text(README, &readme(&template_text, base_url, instances))
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let mut text = serde_json::to_string_pretty(value)
            .map_err(|error| Error::configuration(format!("failed to serialize {name}: {error}")))?;
        text.push('\n');
        self.write_text(name, &text)
    }

    fn write_lines<'a>(&self, name: &str, lines: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let text = lines.into_iter().map(|line| format!("{line}\n")).collect::<String>();
        self.write_text(name, &text)
    }

    fn write_text(&self, name: &str, text: &str) -> Result<()> {
        let path = self.dir.join(name);
        info!("writing {}", path.display());
        fs::write(&path, text).map_err(|error| Error::io(path, error))
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        info!("reading {}", path.display());
        let text = fs::read_to_string(&path).map_err(|error| Error::io(&path, error))?;
        serde_json::from_str(&text)
            .map_err(|error| Error::configuration(format!("{}: {error}", path.display())))
    }

    pub fn read_chosen(&self) -> Result<Vec<Instance>> {
        self.read_json(BUILD_DATA_CHOSEN)
    }

    pub fn read_to_remove(&self) -> Result<Vec<String>> {
        self.read_json(REMOTE_TAGS_TO_RM)
    }

    pub fn read_propagate(&self) -> Result<Vec<Action>> {
        self.read_json(PROPAGATE)
    }

    pub fn read_docker_repo(&self) -> Result<String> {
        let path = self.dir.join(DOCKER_REPO);
        info!("reading {}", path.display());
        let text = fs::read_to_string(&path).map_err(|error| Error::io(&path, error))?;
        Ok(text.trim().to_owned())
    }
}

/// Replaces the marker of the template with the list of tags of every instance, each linking to
/// its Dockerfile.
pub fn readme(template: &str, base_url: &str, instances: &[Instance]) -> String {
    let base_url = base_url.strip_suffix('/').unwrap_or(base_url);
    let list = instances
        .iter()
        .map(|instance| {
            format!(
                "-\t[`{}`]({base_url}/blob/master/{})",
                instance.tags.iter().join("`, `"),
                instance.path
            )
        })
        .join("\n");
    template.replace(
        README_MARKER,
        &format!(
            "# <a name=\"supported-tags\"></a>Supported tags and respective `Dockerfile` links\n\n\
             {list}"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::tests::build;

    #[test]
    fn readme_lists_tags_with_links() {
        let plan = build("", &[]);
        let readme = readme(
            "# coqorg/coq\n\n<!-- tags -->\n\n## Usage\n",
            "https://github.com/coq-community/docker-coq/",
            &plan.all,
        );
        assert_eq!(
            readme,
            "# coqorg/coq\n\n\
             # <a name=\"supported-tags\"></a>Supported tags and respective `Dockerfile` links\n\n\
             -\t[`8.18.0`, `8.18`](https://github.com/coq-community/docker-coq/blob/master/coq/Dockerfile)\n\
             -\t[`8.17.1`, `8.17`](https://github.com/coq-community/docker-coq/blob/master/coq/Dockerfile)\n\
             -\t[`dev`](https://github.com/coq-community/docker-coq/blob/master/coq/Dockerfile)\n\n\
             ## Usage\n"
        );
    }

    #[test]
    fn written_artifacts_read_back() {
        let plan = build("rebuild-tag=dev", &["8.18.0", "8.18", "8.17.1", "8.17", "8.4"]);
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("README.template.md");
        fs::write(&template, "<!-- tags -->\n").unwrap();

        let artifacts = Artifacts::new(dir.path().join("generated"));
        artifacts.write(&plan, &template).unwrap();

        assert_eq!(artifacts.read_chosen().unwrap(), plan.chosen);
        assert_eq!(artifacts.read_to_remove().unwrap(), ["8.4"]);
        assert_eq!(artifacts.read_propagate().unwrap(), plan.propagate);
        assert_eq!(artifacts.read_docker_repo().unwrap(), "coqorg/coq");

        let read = |name: &str| fs::read_to_string(artifacts.dir().join(name)).unwrap();
        assert_eq!(read(DOCKERFILES), "coq/Dockerfile\n");
        assert_eq!(read(REMOTE_TAGS), "8.18.0\n8.18\n8.17.1\n8.17\n8.4\n");
        assert!(read(README).starts_with("# <a name=\"supported-tags\"></a>"));
        let all: Vec<Instance> = serde_json::from_str(&read(BUILD_DATA_ALL)).unwrap();
        assert_eq!(all, plan.all);
        let min: Vec<Instance> = serde_json::from_str(&read(BUILD_DATA_MIN)).unwrap();
        assert_eq!(min, plan.outdated);
    }

    #[test]
    fn missing_readme_templates_are_skipped() {
        let plan = build("", &[]);
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::new(dir.path());
        artifacts.write(&plan, &dir.path().join("missing.md")).unwrap();
        assert!(!dir.path().join(README).exists());
        assert!(dir.path().join(BUILD_DATA_ALL).exists());
    }

    #[test]
    fn missing_artifacts_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::new(dir.path());
        assert!(matches!(artifacts.read_chosen(), Err(Error::Io { .. })));
    }
}
