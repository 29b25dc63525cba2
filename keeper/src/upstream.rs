//! Resolution of moving upstream branches to commits, and of the upstream keeper version.

use std::collections::BTreeMap;

use constcat::concat;
use log::{debug, info};

use crate::{
    error::{Error, Result},
    http::Http,
};

const GITHUB_API: &str = "https://api.github.com";
const GITLAB_API: &str = "https://gitlab.com/api/v4";

/// Where released versions of this tool are published.
pub const UPSTREAM_VERSION_URL: &str = concat!(
    GITLAB_API,
    "/projects/erikmd%2Fdocker-keeper/repository/files/VERSION/raw"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fetcher {
    Github,
    Gitlab,
}

/// `commit_api` of a build template: the branch whose latest commit an image tracks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitApi {
    pub fetcher: Fetcher,
    pub repo: String,
    pub branch: String,
}

pub trait CommitResolver {
    fn latest_commit(&self, api: &CommitApi) -> Result<String>;
}

/// Queries the GitHub and GitLab REST APIs.
pub struct Forges<'a> {
    pub http: &'a Http,
}

impl CommitResolver for Forges<'_> {
    fn latest_commit(&self, api: &CommitApi) -> Result<String> {
        let commit = match api.fetcher {
            Fetcher::Github => {
                let url = format!("{GITHUB_API}/repos/{}/commits/{}", api.repo, api.branch);
                self.http
                    .get_text(&url, &[("Accept", "application/vnd.github.v3.sha")], &[])?
                    .trim()
                    .to_owned()
            }
            Fetcher::Gitlab => {
                #[derive(serde::Deserialize)]
                struct Branch {
                    commit: Commit,
                }
                #[derive(serde::Deserialize)]
                struct Commit {
                    id: String,
                }

                let url = gitlab_branch_url(api)?;
                self.http.get_json::<Branch>(&url, &[], &[])?.commit.id
            }
        };
        info!("{}:{} is at {commit}", api.repo, api.branch);
        Ok(commit)
    }
}

/// Resolves every commit to the same value.
#[derive(Debug, Clone)]
pub struct Pinned(pub String);

impl CommitResolver for Pinned {
    fn latest_commit(&self, _: &CommitApi) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Asks the resolver at most once per distinct [`CommitApi`].
pub struct CommitCache<'a> {
    resolver: &'a dyn CommitResolver,
    resolved: BTreeMap<CommitApi, String>,
}

impl<'a> CommitCache<'a> {
    pub fn new(resolver: &'a dyn CommitResolver) -> Self {
        Self {
            resolver,
            resolved: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, api: &CommitApi) -> Result<String> {
        if let Some(commit) = self.resolved.get(api) {
            debug!("reusing commit {commit} for {}:{}", api.repo, api.branch);
            return Ok(commit.clone());
        }
        let commit = self.resolver.latest_commit(api)?;
        if commit.is_empty() {
            return Err(Error::remote_fetch(
                format!("{}:{}", api.repo, api.branch),
                "no commit found",
            ));
        }
        self.resolved.insert(api.clone(), commit.clone());
        Ok(commit)
    }
}

/// GitLab addresses projects and branches as single path segments, slashes included.
fn gitlab_branch_url(api: &CommitApi) -> Result<String> {
    let mut url = reqwest::Url::parse(GITLAB_API)
        .map_err(|error| Error::remote_fetch(GITLAB_API, error.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| Error::remote_fetch(GITLAB_API, "not a base URL"))?
        .extend(["projects", api.repo.as_str(), "repository", "branches", api.branch.as_str()]);
    Ok(url.into())
}

/// The latest released version of docker-keeper, whose catalog format keeper follows.
pub fn upstream_version(http: &Http) -> Result<semver::Version> {
    parse_version(&http.get_text(UPSTREAM_VERSION_URL, &[], &[("ref", "master")])?)
}

fn parse_version(text: &str) -> Result<semver::Version> {
    semver::Version::parse(text.trim()).map_err(|error| {
        Error::remote_fetch(UPSTREAM_VERSION_URL, format!("invalid version {text:?}: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Counting {
        calls: Cell<usize>,
    }

    impl CommitResolver for Counting {
        fn latest_commit(&self, api: &CommitApi) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(format!("{}-{}", api.repo, api.branch))
        }
    }

    fn api(yaml: &str) -> CommitApi {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn resolution_is_memoized_per_api() {
        let resolver = Counting { calls: Cell::new(0) };
        let mut cache = CommitCache::new(&resolver);
        let master = api("{fetcher: github, repo: coq/coq, branch: master}");
        let v818 = api("{fetcher: github, repo: coq/coq, branch: v8.18}");

        assert_eq!(cache.get(&master).unwrap(), "coq/coq-master");
        assert_eq!(cache.get(&v818).unwrap(), "coq/coq-v8.18");
        assert_eq!(cache.get(&master).unwrap(), "coq/coq-master");
        assert_eq!(resolver.calls.get(), 2);
    }

    #[test]
    fn unknown_fetchers_are_rejected() {
        let error = serde_yaml::from_str::<CommitApi>("{fetcher: bitbucket, repo: a/b, branch: c}")
            .unwrap_err();
        assert!(error.to_string().contains("unknown variant"), "{error}");
    }

    #[test]
    fn gitlab_paths_are_encoded() {
        let url = gitlab_branch_url(&api(
            "{fetcher: gitlab, repo: math-comp/docker-mathcomp, branch: release/2.2}",
        ))
        .unwrap();
        assert_eq!(
            url,
            "https://gitlab.com/api/v4/projects/math-comp%2Fdocker-mathcomp/\
             repository/branches/release%2F2.2"
        );
    }

    #[test]
    fn upstream_versions_are_semver() {
        assert_eq!(parse_version("2.3.1\n").unwrap(), semver::Version::new(2, 3, 1));
        let error = parse_version("master").unwrap_err();
        assert!(matches!(error, Error::RemoteFetch { .. }), "{error}");
    }

    #[test]
    #[ignore = "requires network access"]
    fn resolve_github_branch() {
        let http = Http::new().unwrap();
        let commit = Forges { http: &http }
            .latest_commit(&api("{fetcher: github, repo: coq/coq, branch: master}"))
            .unwrap();
        assert_eq!(commit.len(), 40);
    }

    #[test]
    #[ignore = "requires network access"]
    fn resolve_gitlab_branch() {
        let http = Http::new().unwrap();
        let commit = Forges { http: &http }
            .latest_commit(&api("{fetcher: gitlab, repo: erikmd/docker-keeper, branch: master}"))
            .unwrap();
        assert_eq!(commit.len(), 40);
    }
}
