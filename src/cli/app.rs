use std::fs;
use std::io::{Read, Write};

use clap::{crate_version, AppSettings, ArgMatches};
use tracing::debug;

use crate::{cmds, Result};

pub(crate) fn clap_app<'a, 'b>() -> clap::App<'a, 'b> {
    let app = clap::App::new("rscommit")
        .version(crate_version!())
        .about("Inspect git commit records and the history they describe")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::VersionlessSubcommands);

    cmds::add_subcommands(app)
}

/// The parsed command line plus the streams a command reads records from
/// and writes its report to.
pub(crate) struct App<'a> {
    pub arg_matches: ArgMatches<'a>,
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
}

impl<'a> App<'a> {
    pub fn run(&mut self) -> Result<()> {
        cmds::dispatch(self)
    }

    /// Reads one raw record named by a subcommand's `--stdin` flag or
    /// `file` argument. Exactly one of the two must be given.
    pub fn read_record(&mut self, args: &ArgMatches) -> Result<Vec<u8>> {
        let from_stdin = args.is_present("stdin");

        match args.value_of("file") {
            Some(file) if !from_stdin => {
                debug!(file, "reading record");
                Ok(fs::read(file)?)
            }
            None if from_stdin => {
                debug!("reading record from stdin");
                let mut data = Vec::new();
                self.stdin.read_to_end(&mut data)?;
                Ok(data)
            }
            _ => Err(Box::new(clap::Error {
                message: "commit source must be either --stdin or a file path".to_string(),
                kind: clap::ErrorKind::MissingRequiredArgument,
                info: None,
            })),
        }
    }

    /// Flushes the report and turns the command's outcome into a process
    /// exit status, printing the error (if any) to stderr.
    pub fn finish(self, result: Result<()>) -> i32 {
        let flushed = self.stdout.flush();

        match result.and(flushed.map_err(Into::into)) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                1
            }
        }
    }

    /// Runs one command line (without the program name) against in-memory
    /// streams and returns what it wrote to stdout.
    #[cfg(test)]
    pub fn run_for_test(stdin: &[u8], args: &[&str]) -> Result<Vec<u8>> {
        let mut stdin = stdin;
        let mut stdout = Vec::new();

        let argv = std::iter::once("rscommit").chain(args.iter().copied());

        App {
            arg_matches: clap_app().get_matches_from_safe(argv)?,
            stdin: &mut stdin,
            stdout: &mut stdout,
        }
        .run()?;

        Ok(stdout)
    }
}
