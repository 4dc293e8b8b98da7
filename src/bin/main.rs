use std::process;

use clap::Parser;

#[macro_use]
extern crate log;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Parse command line arguments, initialize the logger and run.
fn main() {
    // ----------------------------- Run CLI Parser
    let cli = parser::Cli::parse();

    // ----------------------------- Init logger.
    logger::Logger::init_cli(cli.verbose, cli.quiet);

    // ----------------------------- Serialize command line arguments
    if let Err(e) = cli.serialize() {
        error!("{e:?}");
        process::exit(1);
    }

    // ----------------------------- Run the requested command.
    match kmlst::run(cli) {
        Ok(()) => (),
        Err(e) => {
            error!("{e:?}");
            process::exit(1);
        }
    };
}
