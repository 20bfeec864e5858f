#![deny(warnings)]

use std::{error::Error, io};

use tracing_subscriber::EnvFilter;

mod app;
pub(crate) use app::App;

mod cmds;

pub(crate) type Result<T> = std::result::Result<T, Box<dyn Error>>;

fn main() {
    init_tracing();

    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    // Help, version, and usage errors are handled (and exit) inside clap.
    let mut app = App {
        arg_matches: app::clap_app().get_matches(),
        stdin: &mut stdin,
        stdout: &mut stdout,
    };

    let result = app.run();
    std::process::exit(app.finish(result));
}

// Log events go to stderr so they never mix with command output.
// Set RUST_LOG (e.g. `RUST_LOG=rscommit=debug`) to see more than warnings.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
