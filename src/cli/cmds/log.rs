use std::{fs, path::Path};

use clap::{App as ClapApp, Arg, ArgMatches, SubCommand};
use tracing::{debug, warn};

use rscommit::history::{self, CommitStore, LookupError};
use rscommit::object::Id;

use super::required_arg;
use crate::{App, Result};

pub(crate) fn subcommand<'a, 'b>() -> ClapApp<'a, 'b> {
    SubCommand::with_name("log")
        .about("Show the history of a commit, newest first")
        .arg(
            Arg::with_name("directory")
                .required(true)
                .help("Directory of raw commit records, one per file"),
        )
        .arg(
            Arg::with_name("commit")
                .required(true)
                .help("ID of the commit to start from"),
        )
}

pub(crate) fn run(app: &mut App, args: &ArgMatches) -> Result<()> {
    let dir = required_arg(args, "directory")?;
    let start: Id = required_arg(args, "commit")?.parse()?;

    let store = load_store(Path::new(dir))?;
    let start = store.get(&start).ok_or(LookupError::NotFound(start))?;

    for commit in history::history(&start, &store)? {
        writeln!(app.stdout, "{} {}", commit.id(), commit.summary())?;
    }

    Ok(())
}

fn load_store(dir: &Path) -> Result<CommitStore> {
    let mut store = CommitStore::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let data = fs::read(&path)?;
        match store.insert_raw(&data) {
            Ok(commit) => debug!(id = %commit.id(), path = %path.display(), "loaded commit"),
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping file that is not a commit record")
            }
        }
    }

    Ok(store)
}
