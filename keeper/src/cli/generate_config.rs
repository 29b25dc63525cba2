use std::path::Path;

use clap::Args;

use crate::{
    artifacts::Artifacts,
    pipeline::{self, Pipeline},
    Result,
};

#[derive(Debug, Args)]
pub struct GenerateConfigArgs {
    /// Where the keeper checkout lives in the repository, relative to its root.
    #[arg(long = "keeper-dir", env = "KEEPER_DIR", default_value = "docker-keeper")]
    pub keeper_dir: String,
}

pub fn generate_config(output_dir: &Path, args: GenerateConfigArgs) -> Result<()> {
    let artifacts = Artifacts::new(output_dir);
    let docker_repo = artifacts.read_docker_repo()?;
    let chosen = artifacts.read_chosen()?;
    let propagate = artifacts.read_propagate()?;
    let stale_tags = artifacts.read_to_remove()?;

    let yaml = pipeline::generate(&Pipeline {
        docker_repo: &docker_repo,
        chosen: &chosen,
        propagate: &propagate,
        stale_tags: &stale_tags,
        keeper_dir: &args.keeper_dir,
    })?;
    print!("{yaml}");

    Ok(())
}
