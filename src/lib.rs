use parser::{Cli, Commands::*};

#[macro_use]
extern crate log;

use anyhow::Result;

/// Dispatch a parsed command line invocation to the appropriate runner.
pub fn run(cli: Cli) -> Result<()> {
    match cli.commands {
        Call {common, call} => {
            allele_caller::run(&common, &call)?;
        },

        FromYaml {yaml} => {
            info!("Replaying arguments from {}...", yaml.display());
            let cli: Cli = Cli::deserialize(&yaml)?;
            self::run(cli)?;
        }
    };
    Ok(())
}
