//! Generation of the GitLab CI configuration that builds and pushes the chosen instances.

use constcat::concat;
use log::info;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::{
    error::{Error, Result},
    instance::Instance,
    ordered::OrderedMap,
    propagate::Action,
    shell,
};

pub const HEADER: &str = concat!(
    "# GitLab CI config generated by keeper; do not edit.\n",
    "# yamllint disable rule:line-length rule:empty-lines\n",
);

/// The helper script, relative to the keeper directory, that defines `dk_login`, `dk_build`,
/// `dk_push` and `dk_logout`.
pub const FUNCTIONS_SCRIPT: &str = "gitlab_functions.sh";

const DEPLOY_TEMPLATE: &str = ".docker-deploy";
const DEPLOY_STAGE: &str = "deploy";
const PROPAGATE_STAGE: &str = "propagate";
const REMOVE_STAGE: &str = "remove";
const BRANCH: &str = "master";

/// The directive variable read by the pipelines of child repositories.
pub const DIRECTIVE_VARIABLE: &str = "KEEPER_DIRECTIVE";

#[derive(Debug, Default, Serialize)]
struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    extends: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    services: Vec<&'static str>,
    #[serde(skip_serializing_if = "OrderedMap::is_empty")]
    variables: OrderedMap<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    before_script: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    script: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    when: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    only: Vec<&'static str>,
}

/// What the pipeline is generated from.
pub struct Pipeline<'a> {
    pub docker_repo: &'a str,
    pub chosen: &'a [Instance],
    pub propagate: &'a [Action],
    pub stale_tags: &'a [String],
    /// Where the keeper checkout lives inside the repository, e.g. `docker-keeper`.
    pub keeper_dir: &'a str,
}

pub fn generate(plan: &Pipeline) -> Result<String> {
    let mut document = Mapping::new();

    if plan.chosen.is_empty() {
        info!("nothing to build, generating a noop pipeline");
        insert(&mut document, "stages", vec![DEPLOY_STAGE])?;
        insert(
            &mut document,
            "noop",
            Job {
                stage: Some(DEPLOY_STAGE),
                image: Some("alpine:latest"),
                variables: [("GIT_STRATEGY", "none")].into_iter().collect(),
                script: vec![r#"echo "No image to rebuild.""#.to_owned()],
                only: vec![BRANCH],
                ..Default::default()
            },
        )?;
        return render(document);
    }

    insert(
        &mut document,
        "stages",
        vec![DEPLOY_STAGE, PROPAGATE_STAGE, REMOVE_STAGE],
    )?;
    insert(&mut document, DEPLOY_TEMPLATE, deploy_template(plan.docker_repo))?;

    for (index, instance) in plan.chosen.iter().enumerate() {
        let number = index + 1;
        insert(
            &mut document,
            &format!("deploy_{number}_{}", instance.shortest_tag()),
            deploy_job(plan, number, instance),
        )?;
    }

    for action in plan.propagate {
        insert(
            &mut document,
            &format!("propagate_{}", action.child),
            propagate_job(action),
        )?;
    }

    if !plan.stale_tags.is_empty() {
        insert(&mut document, "remove_tags", remove_job(plan.docker_repo, plan.stale_tags))?;
    }

    info!(
        "generated {} deploy jobs and {} propagate jobs",
        plan.chosen.len(),
        plan.propagate.len()
    );
    render(document)
}

fn insert<T: Serialize>(document: &mut Mapping, key: &str, value: T) -> Result<()> {
    let value = serde_yaml::to_value(value)
        .map_err(|error| Error::configuration(format!("failed to serialize {key}: {error}")))?;
    document.insert(Value::String(key.to_owned()), value);
    Ok(())
}

fn render(document: Mapping) -> Result<String> {
    let yaml = serde_yaml::to_string(&document)
        .map_err(|error| {
            Error::configuration(format!("failed to serialize the pipeline: {error}"))
        })?;
    Ok(format!("---\n{HEADER}\n{yaml}"))
}

fn deploy_template(docker_repo: &str) -> Job {
    Job {
        stage: Some(DEPLOY_STAGE),
        image: Some("docker:latest"),
        services: vec!["docker:dind"],
        // HUB_USER and HUB_TOKEN are protected variables of the project.
        variables: [("HUB_REPO", docker_repo)].into_iter().collect(),
        before_script: [
            "cat /proc/cpuinfo /proc/meminfo",
            "apk add --no-cache bash curl",
            "/usr/bin/env bash --version",
            "curl --version",
        ]
        .map(str::to_owned)
        .to_vec(),
        only: vec![BRANCH],
        ..Default::default()
    }
}

fn deploy_job(plan: &Pipeline, number: usize, instance: &Instance) -> Job {
    let image = format!("image_{number}");
    let functions = format!("{}/{FUNCTIONS_SCRIPT}", plan.keeper_dir.trim_end_matches('/'));
    let args = instance
        .args
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>();

    let mut lines = vec![
        format!(". {}", shell::quote(&functions)),
        "dk_login".to_owned(),
        shell::quote_join(
            ["dk_build", instance.context.as_str(), instance.dockerfile.as_str(), image.as_str()]
                .into_iter()
                .chain(args.iter().map(String::as_str)),
        ),
        shell::quote_join(
            ["dk_push", plan.docker_repo, image.as_str()]
                .into_iter()
                .chain(instance.tags.iter().map(String::as_str)),
        ),
        "dk_logout".to_owned(),
    ];
    lines.extend(instance.after_deploy_script.iter().cloned());

    Job {
        extends: Some(DEPLOY_TEMPLATE),
        script: vec![format!(
            "/usr/bin/env bash -e -c {} bash",
            shell::quote(&lines.join("\n"))
        )],
        ..Default::default()
    }
}

fn propagate_job(action: &Action) -> Job {
    let body = serde_json::json!({
        "ref": BRANCH,
        "variables": [{ "key": DIRECTIVE_VARIABLE, "value": action.directive }],
    });
    let url = format!(
        "https://{}/api/v4/projects/{}/pipeline",
        action.gitlab_domain,
        action.gitlab_project.replace('/', "%2F")
    );

    // The token header is double quoted so that the shell expands the variable.
    let script = format!(
        "curl --fail --silent --show-error --request POST \
         --header \"PRIVATE-TOKEN: ${{{}}}\" {} {}",
        action.api_token_env_var,
        shell::quote_join([
            "--header",
            "Content-Type: application/json",
            "--data",
            &body.to_string(),
        ]),
        shell::quote(&url),
    );
    let announce = format!("triggering {}: {}", action.child, action.directive);

    Job {
        stage: Some(PROPAGATE_STAGE),
        image: Some("curlimages/curl:latest"),
        variables: [("GIT_STRATEGY", "none")].into_iter().collect(),
        script: vec![
            format!("echo {}", shell::quote(&announce)),
            script,
        ],
        only: vec![BRANCH],
        ..Default::default()
    }
}

fn remove_job(docker_repo: &str, stale_tags: &[String]) -> Job {
    let mut script = vec![shell::quote_join([
        "echo",
        &format!(
            "{} tags of {docker_repo} are not produced by the catalog anymore:",
            stale_tags.len()
        ),
    ])];
    script.extend(stale_tags.iter().map(|tag| shell::quote_join(["echo", "-", tag])));

    Job {
        stage: Some(REMOVE_STAGE),
        image: Some("alpine:latest"),
        variables: [("GIT_STRATEGY", "none")].into_iter().collect(),
        script,
        when: Some("manual"),
        only: vec![BRANCH],
        ..Default::default()
    }
}
