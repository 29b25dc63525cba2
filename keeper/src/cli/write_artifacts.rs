use std::path::{Path, PathBuf};

use clap::Args;
use log::info;

use crate::{
    artifacts::Artifacts,
    catalog::Catalog,
    command::{Commands, COMMIT_MESSAGE_PREFIX},
    http::Http,
    instance::Defaults,
    plan::Plan,
    remote::DockerHub,
    upstream::Forges,
    Result,
};

#[derive(Debug, Args)]
pub struct WriteArtifactsArgs {
    /// Build the images not all of whose tags are published. This is the default.
    #[arg(long = "minimal", default_value_t)]
    pub minimal: bool,

    /// Also build the images flagged as nightly.
    #[arg(long = "nightly", default_value_t)]
    pub nightly: bool,

    /// Build every image of the catalog.
    #[arg(long = "rebuild-all", default_value_t)]
    pub rebuild_all: bool,

    /// Also build the images of these comma-separated Dockerfile paths.
    #[arg(long = "rebuild-file", value_name = "LIST")]
    pub rebuild_file: Vec<String>,

    /// Also build the images producing any of these comma-separated tags.
    #[arg(long = "rebuild-tag", value_name = "LIST")]
    pub rebuild_tag: Vec<String>,

    /// Also build the images with any of these comma-separated keywords.
    #[arg(long = "rebuild-keyword", value_name = "LIST")]
    pub rebuild_keyword: Vec<String>,

    /// Replace the propagation strategy of a child, e.g. `mathcomp: minimal`. An empty value
    /// disables propagation.
    #[arg(long = "propagate", value_name = "CHILD: MODE")]
    pub propagate: Vec<String>,

    /// Commands separated by `;`, e.g. `nightly; rebuild-tag=dev`.
    #[arg(long = "directive", env = "KEEPER_DIRECTIVE", value_name = "COMMANDS")]
    pub directive: Option<String>,

    #[arg(
        long = "commit-message",
        env = "CI_COMMIT_MESSAGE",
        value_name = "MESSAGE",
        help = constcat::concat!(
            "A commit message whose lines starting with `",
            COMMIT_MESSAGE_PREFIX,
            "` carry commands."
        )
    )]
    pub commit_message: Option<String>,

    /// The README with a `<!-- tags -->` marker to generate the README of the output directory
    /// from.
    #[arg(long = "readme", default_value = "README.md")]
    pub readme: PathBuf,
}

impl WriteArtifactsArgs {
    fn commands(&self) -> Result<Commands> {
        let flags = [
            (self.minimal, "minimal"),
            (self.nightly, "nightly"),
            (self.rebuild_all, "rebuild-all"),
        ];
        let lists = [
            ("rebuild-file", &self.rebuild_file),
            ("rebuild-tag", &self.rebuild_tag),
            ("rebuild-keyword", &self.rebuild_keyword),
            ("propagate", &self.propagate),
        ];

        let mut commands = Commands::default();
        for (_, command) in flags.into_iter().filter(|(set, _)| *set) {
            commands.extend(Commands::parse(command)?);
        }
        for (name, values) in lists {
            for value in values {
                commands.extend(Commands::parse(&format!("{name}={value}"))?);
            }
        }
        if let Some(directive) = &self.directive {
            commands.extend(Commands::parse(directive)?);
        }
        if let Some(message) = &self.commit_message {
            commands.extend(Commands::from_commit_message(message)?);
        }
        Ok(commands)
    }
}

pub fn write_artifacts(catalog: &Path, output_dir: &Path, args: WriteArtifactsArgs) -> Result<()> {
    let commands = args.commands()?;
    let catalog = Catalog::load(catalog)?;
    let defaults = Defaults::now()?;

    let http = Http::new()?;
    let plan = Plan::build(
        &catalog,
        &commands,
        &defaults,
        &DockerHub { http: &http },
        &Forges { http: &http },
    )?;

    let artifacts = Artifacts::new(output_dir);
    artifacts.write(&plan, &args.readme)?;
    info!("artifacts written to {}", artifacts.dir().display());

    Ok(())
}
