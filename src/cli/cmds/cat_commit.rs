use clap::{App as ClapApp, Arg, ArgMatches, SubCommand};
use tracing::debug;

use rscommit::object::Commit;

use crate::{App, Result};

pub(crate) fn subcommand<'a, 'b>() -> ClapApp<'a, 'b> {
    SubCommand::with_name("cat-commit")
        .about("Check a commit record and print it in canonical form")
        .arg(
            Arg::with_name("stdin")
                .long("stdin")
                .help("Read the commit record from standard input instead of from a file"),
        )
        .arg(Arg::with_name("file"))
}

pub(crate) fn run(app: &mut App, args: &ArgMatches) -> Result<()> {
    let data = app.read_record(args)?;
    let commit = Commit::parse(&data)?;
    debug!(id = %commit.id(), parents = commit.parents().len(), "parsed commit");

    writeln!(app.stdout, "commit {}", commit.id())?;
    app.stdout.write_all(&commit.serialize())?;

    Ok(())
}
