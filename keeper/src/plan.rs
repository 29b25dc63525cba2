//! One run of the engine: expand the catalog, compare it to the registry, choose what to build and
//! what to propagate.

use image_reference::Repository;
use log::info;

use crate::{
    catalog::Catalog,
    command::Commands,
    error::Result,
    instance::{self, Defaults, Instance},
    propagate::{self, Action, Aggregate},
    remote::{self, RemoteDiff, TagLister},
    select,
    upstream::{CommitCache, CommitResolver},
};

/// Everything the artifacts are written from.
#[derive(Debug, Clone)]
pub struct Plan {
    pub docker_repo: Repository,
    pub base_url: Option<String>,
    pub all: Vec<Instance>,
    pub chosen: Vec<Instance>,
    /// The instances not fully published, what `minimal` builds.
    pub outdated: Vec<Instance>,
    pub remote_tags: Vec<String>,
    pub to_remove: Vec<String>,
    pub propagate: Vec<Action>,
}

impl Plan {
    pub fn build(
        catalog: &Catalog,
        commands: &Commands,
        defaults: &Defaults,
        tags: &dyn TagLister,
        commits: &dyn CommitResolver,
    ) -> Result<Self> {
        let mut commits = CommitCache::new(commits);
        let all = instance::expand(catalog, defaults, &mut commits)?;

        let remote_tags = tags.list_tags(&catalog.docker_repo)?;
        let RemoteDiff { outdated, to_remove } = remote::diff(&all, &remote_tags);

        let chosen = select::choose(&all, &outdated, &commands.selections);
        let aggregate = Aggregate::new(
            &chosen.iter().map(|&index| &all[index]).collect::<Vec<_>>(),
            &catalog.vars,
            commands.rebuild_all(),
        );
        let propagate = propagate::plan(&catalog.propagate, &commands.directives, &aggregate)?;

        let pick = |indices: &[usize]| {
            indices.iter().map(|&index| all[index].clone()).collect::<Vec<_>>()
        };
        let chosen = pick(&chosen);
        let outdated = pick(&outdated);
        info!(
            "building {} of {} instances, propagating to {} children",
            chosen.len(),
            all.len(),
            propagate.len()
        );

        Ok(Self {
            docker_repo: catalog.docker_repo.clone(),
            base_url: catalog.base_url.clone(),
            all,
            chosen,
            outdated,
            remote_tags,
            to_remove,
            propagate,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::upstream::Pinned;

    pub(crate) const CATALOG: &str = r#"
active: true
docker_repo: coqorg/coq
base_url: https://github.com/coq-community/docker-coq/
args:
  BUILD_DATE: '{defaults[build_date]}'
propagate:
  mathcomp:
    api_token_env_var: DMC_TOKEN
    gitlab_domain: gitlab.inria.fr
    gitlab_project: math-comp/docker-mathcomp
    strategy:
      - when: rebuild-all
        mode: rebuild-all
      - when: forall
        expr: '{matrix[coq][%.*]}'
        subset: '8.17,8.18,dev'
        mode:
          rebuild-keyword: '{keywords[#,]}'
images:
  - matrix:
      coq: ['8.18.0', '8.17.1']
    build:
      context: ./coq
      keywords: ['{matrix[coq][%.*]}']
      tags:
        - tag: '{matrix[coq]}'
        - tag: '{matrix[coq][%.*]}'
  - matrix:
      coq: ['dev']
    build:
      context: ./coq
      nightly: true
      keywords: ['dev']
      commit_api:
        fetcher: github
        repo: coq/coq
        branch: master
      args:
        COQ_COMMIT: '{defaults[commit]}'
        VCS_REF: '{defaults[commit][0:7]}'
      tags:
        - tag: 'dev'
"#;

    pub(crate) struct Published(pub &'static [&'static str]);

    impl TagLister for Published {
        fn list_tags(&self, _: &Repository) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|tag| tag.to_string()).collect())
        }
    }

    pub(crate) fn defaults() -> Defaults {
        Defaults {
            build_date: "2024-01-01T00:00:00Z".to_owned(),
        }
    }

    pub(crate) fn build(commands: &str, published: &'static [&'static str]) -> Plan {
        let catalog = Catalog::parse(CATALOG).unwrap();
        let commands = Commands::parse(commands).unwrap();
        let commit = Pinned("0123456789abcdef".to_owned());
        Plan::build(&catalog, &commands, &defaults(), &Published(published), &commit).unwrap()
    }

    fn tags(instances: &[Instance]) -> Vec<&str> {
        instances.iter().map(Instance::shortest_tag).collect()
    }

    #[test]
    fn minimal_builds_what_is_missing() {
        let plan = build("", &["8.18.0", "8.18", "8.17.1", "8.16"]);
        assert_eq!(tags(&plan.all), ["8.18", "8.17", "dev"]);
        assert_eq!(tags(&plan.outdated), ["8.17", "dev"]);
        assert_eq!(tags(&plan.chosen), ["8.17", "dev"]);
        assert_eq!(plan.to_remove, ["8.16"]);

        assert_eq!(plan.propagate.len(), 1);
        assert_eq!(plan.propagate[0].child, "mathcomp");
        assert_eq!(plan.propagate[0].directive, "rebuild-keyword=8.17,dev");
    }

    #[test]
    fn upstream_commits_flow_into_args() {
        let plan = build("", &[]);
        let dev = &plan.all[2];
        assert_eq!(dev.commit.as_deref(), Some("0123456789abcdef"));
        assert_eq!(dev.args.get("VCS_REF").map(String::as_str), Some("0123456"));
        assert_eq!(dev.args.get("BUILD_DATE").map(String::as_str), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn up_to_date_registries_build_nothing() {
        let plan = build("", &["8.18.0", "8.18", "8.17.1", "8.17", "dev"]);
        assert!(plan.chosen.is_empty());
        assert!(plan.propagate.is_empty());

        let plan = build("nightly", &["8.18.0", "8.18", "8.17.1", "8.17", "dev"]);
        assert_eq!(tags(&plan.chosen), ["dev"]);
    }

    #[test]
    fn rebuild_all_propagates_rebuild_all() {
        let plan = build("rebuild-all", &["8.18.0", "8.18", "8.17.1", "8.17", "dev"]);
        assert_eq!(plan.chosen, plan.all);
        assert_eq!(plan.propagate[0].directive, "rebuild-all");

        let plan = build("rebuild-all; propagate=", &[]);
        assert!(plan.propagate.is_empty());
    }

    #[test]
    fn strategies_that_do_not_match_do_not_propagate() {
        let plan = build("rebuild-tag=8.18", &["8.18.0", "8.18", "8.17.1", "8.17", "dev"]);
        assert_eq!(tags(&plan.chosen), ["8.18"]);
        assert_eq!(plan.propagate[0].directive, "rebuild-keyword=8.18");

        let plan = build("propagate=mathcomp: nil", &[]);
        assert!(plan.propagate.is_empty());
    }
}
