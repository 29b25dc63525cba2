//! The commands that drive a run: `minimal`, `nightly`, `rebuild-all`, `rebuild-file=a,b`,
//! `rebuild-tag=...`, `rebuild-keyword=...`, `noop` and `propagate=<child>: <mode>`.
//!
//! They come from command line flags, from a directive string such as `nightly; rebuild-tag=dev`,
//! or from `docker-keeper: ...` lines of a commit message. All sources add up.

use std::collections::BTreeSet;

use log::debug;

use crate::{
    error::{Error, Result},
    propagate::Directive,
    select::Selection,
};

/// The prefix of commit message lines that carry commands.
pub const COMMIT_MESSAGE_PREFIX: &str = "docker-keeper:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commands {
    pub selections: Vec<Selection>,
    pub directives: Vec<Directive>,
}

impl Commands {
    pub fn extend(&mut self, other: Commands) {
        self.selections.extend(other.selections);
        self.directives.extend(other.directives);
    }

    pub fn rebuild_all(&self) -> bool {
        self.selections.contains(&Selection::RebuildAll)
    }

    /// Parses `cmd1; cmd2; ...`. Empty commands are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut commands = Commands::default();
        for command in text.split(';').map(str::trim).filter(|command| !command.is_empty()) {
            commands.push(command)?;
        }
        Ok(commands)
    }

    /// Parses every line of the form `docker-keeper: cmd1; cmd2`.
    pub fn from_commit_message(message: &str) -> Result<Self> {
        let mut commands = Commands::default();
        for line in message.lines() {
            if let Some(rest) = line.trim().strip_prefix(COMMIT_MESSAGE_PREFIX) {
                debug!("commit message directive: {rest}");
                commands.extend(Self::parse(rest)?);
            }
        }
        Ok(commands)
    }

    fn push(&mut self, command: &str) -> Result<()> {
        if let Some(directive) = command.strip_prefix("propagate=") {
            self.directives.push(Directive::parse(directive)?);
            return Ok(());
        }

        let selection = match command.split_once('=') {
            None => match command {
                "minimal" => Selection::Minimal,
                "nightly" => Selection::Nightly,
                "rebuild-all" => Selection::RebuildAll,
                "noop" | "no-op" => Selection::Noop,
                _ => return Err(unknown(command)),
            },
            Some((name, items)) => {
                let items = list(items);
                if items.is_empty() {
                    return Err(Error::configuration(format!("{name}= needs at least one item")));
                }
                match name.trim() {
                    "rebuild-file" => Selection::RebuildFiles(items),
                    "rebuild-tag" => Selection::RebuildTags(items),
                    "rebuild-keyword" => Selection::RebuildKeywords(items),
                    _ => return Err(unknown(command)),
                }
            }
        };
        self.selections.push(selection);
        Ok(())
    }
}

/// Splits a comma-separated list, ignoring blanks around and between items.
pub fn list(items: &str) -> BTreeSet<String> {
    items
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn unknown(command: &str) -> Error {
    Error::configuration(format!(
        "unknown command {command:?}, expected one of minimal, nightly, rebuild-all, \
         rebuild-file=<files>, rebuild-tag=<tags>, rebuild-keyword=<keywords>, noop, \
         propagate=<child>: <mode>"
    ))
}
