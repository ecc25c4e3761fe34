use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
    process,
};

use anyhow::Context;
use clap::{ArgAction, Parser};
use cordyceps_avl::shell::Shell;
use log::Level;

/// Drives an AVL set with commands read from a file or standard input.
///
/// Each line holds one command: `i <key>` inserts, `l <key>` looks up, `r <key>` removes, `s`
/// prints the size, `c` clears, `p` prints the keys, `v` runs the sanity check and `g` prints a
/// graphviz rendering of the tree.
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// File to read commands from. Reads standard input if omitted.
    input: Option<PathBuf>,

    /// Checks the tree's invariants after every command that modifies it
    #[clap(long)]
    verify: bool,

    /// Enables verbose logging
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(err) = run() {
        log::error!("{:?}", err);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logger(args.verbose);

    let mut shell = Shell::new().verify(args.verify);
    let stdout = io::stdout().lock();

    match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            shell.run(BufReader::new(file), stdout)?;
        }
        None => shell.run(io::stdin().lock(), stdout)?,
    }

    log::info!("finished with {} keys", shell.set().len());

    Ok(())
}

fn init_logger(verbosity: u8) {
    use std::io::Write;

    env_logger::Builder::from_default_env()
        .filter(None, verbosity_level(verbosity).to_level_filter())
        .format(|f, record| {
            writeln!(
                f,
                "{:>5} [{}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// Maps the number of `--verbose` flags to a log level.
fn verbosity_level(num: u8) -> Level {
    match num {
        0 => Level::Warn,
        1 => Level::Info,
        2 => Level::Debug,
        3.. => Level::Trace,
    }
}
