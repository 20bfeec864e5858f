use clap::ArgMatches;
use tracing::debug;

use crate::{App, Result};

mod cat_commit;
mod log;

pub(crate) fn add_subcommands<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    app.subcommand(cat_commit::subcommand())
        .subcommand(log::subcommand())
}

pub(crate) fn dispatch(app: &mut App) -> Result<()> {
    // Cloned so that `app` can be handed to the subcommand mutably.
    let matches = app.arg_matches.clone();
    let (name, args) = matches.subcommand();
    debug!(subcommand = name, "dispatching");

    match (name, args) {
        ("cat-commit", Some(args)) => cat_commit::run(app, args),
        ("log", Some(args)) => log::run(app, args),
        // clap exits with usage before we get here without a known subcommand.
        _ => unreachable!(),
    }
}

pub(crate) fn required_arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    match args.value_of(name) {
        Some(value) => Ok(value),
        None => Err(Box::new(clap::Error {
            message: format!("missing required argument <{}>", name),
            kind: clap::ErrorKind::MissingRequiredArgument,
            info: None,
        })),
    }
}
