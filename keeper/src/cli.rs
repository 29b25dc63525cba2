mod generate_config;
mod tags;
mod upstream_version;
mod write_artifacts;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{version::VERSION, Result};

#[derive(Debug, Parser)]
#[command(version = VERSION, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// The catalog of images to maintain.
    #[arg(long = "catalog", global = true, env = "KEEPER_CATALOG", default_value = "images.yml")]
    catalog: PathBuf,

    /// Where the artifacts are written to and read from.
    #[arg(
        long = "output-dir",
        global = true,
        env = "KEEPER_OUTPUT_DIR",
        default_value = "generated"
    )]
    output_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Expand the catalog, compare it to the registry and write the build data
    WriteArtifacts(write_artifacts::WriteArtifactsArgs),

    /// Print the GitLab CI configuration that builds the chosen images
    GenerateConfig(generate_config::GenerateConfigArgs),

    /// List the tags of every image of the catalog
    Tags,

    /// Print the latest released version of docker-keeper
    UpstreamVersion,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::WriteArtifacts(args) => {
                write_artifacts::write_artifacts(&self.catalog, &self.output_dir, args)?;
            }
            Commands::GenerateConfig(args) => {
                generate_config::generate_config(&self.output_dir, args)?;
            }
            Commands::Tags => {
                tags::tags(&self.catalog)?;
            }
            Commands::UpstreamVersion => {
                upstream_version::upstream_version()?;
            }
        }

        Ok(())
    }
}
