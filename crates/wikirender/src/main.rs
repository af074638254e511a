//! `wikirender` command-line entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use log::info;

fn main() -> anyhow::Result<()> {
    wikirender::init_logging();

    let cli = Cli::parse();
    info!("starting wikirender cli");
    let output = cli::run(&cli)?;
    println!("{output}");
    Ok(())
}
