//! Published tags and how they compare to the plan.

use std::{collections::HashSet, thread, time::Duration};

use image_reference::Repository;
use log::{debug, info};

use crate::{
    error::{Error, Result},
    http::Http,
    instance::Instance,
};

const DOCKER_HUB_API: &str = "https://registry.hub.docker.com/v2/repositories";
const DOCKER_HUB_REGISTRIES: [&str; 2] = ["docker.io", "registry.hub.docker.com"];
const PAGE_SIZE: &str = "100";
/// Docker Hub rate limits anonymous clients, pause after this many pages.
const PAGES_PER_PAUSE: usize = 5;
const PAUSE: Duration = Duration::from_millis(1100);

pub trait TagLister {
    fn list_tags(&self, repository: &Repository) -> Result<Vec<String>>;
}

pub struct DockerHub<'a> {
    pub http: &'a Http,
}

#[derive(Debug, serde::Deserialize)]
struct Page {
    next: Option<String>,
    results: Vec<PageTag>,
}

#[derive(Debug, serde::Deserialize)]
struct PageTag {
    name: String,
}

impl TagLister for DockerHub<'_> {
    fn list_tags(&self, repository: &Repository) -> Result<Vec<String>> {
        if let Some(registry) = repository.registry() {
            if !DOCKER_HUB_REGISTRIES.contains(&registry) {
                return Err(Error::remote_fetch(
                    repository.as_str(),
                    format!("only Docker Hub repositories can be listed, not {registry}"),
                ));
            }
        }

        let mut tags = Vec::new();
        let mut url = format!("{DOCKER_HUB_API}/{}/tags", repository.path());
        let mut query: &[(&str, &str)] = &[("page_size", PAGE_SIZE)];

        for page in 1.. {
            let Page { next, results } = self.http.get_json(&url, &[], query)?;
            debug!("page {page} lists {} tags", results.len());
            tags.extend(results.into_iter().map(|tag| tag.name));

            // The next URL carries the query of its own.
            match next {
                Some(next) => {
                    url = next;
                    query = &[];
                }
                None => break,
            }
            if page % PAGES_PER_PAUSE == 0 {
                thread::sleep(PAUSE);
            }
        }

        info!("{repository} has {} published tags", tags.len());
        Ok(tags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDiff {
    /// Indices of the instances not all of whose tags are published.
    pub outdated: Vec<usize>,
    /// Published tags no instance produces, in the order they were listed.
    pub to_remove: Vec<String>,
}

pub fn diff(instances: &[Instance], remote: &[String]) -> RemoteDiff {
    let published = remote.iter().map(String::as_str).collect::<HashSet<_>>();
    let desired = instances
        .iter()
        .flat_map(|instance| instance.tags.iter().map(String::as_str))
        .collect::<HashSet<_>>();

    let outdated = instances
        .iter()
        .enumerate()
        .filter(|(_, instance)| !instance.tags.iter().all(|tag| published.contains(tag.as_str())))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    let to_remove = remote
        .iter()
        .filter(|tag| !desired.contains(tag.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    info!(
        "{} of {} instances are not fully published, {} published tags are stale",
        outdated.len(),
        instances.len(),
        to_remove.len()
    );
    RemoteDiff { outdated, to_remove }
}
