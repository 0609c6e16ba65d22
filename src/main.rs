use crate::commands::probe::probe_files;
use crate::commands::rewrite::rewrite_cue;
use crate::commands::{Cli, Commands};
use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

mod commands;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let logger = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .build();

    let level = logger.filter();
    let pb = MultiProgress::new();

    LogWrapper::new(pb.clone(), logger).try_init()?;
    log::set_max_level(level);

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe(cmd) => probe_files(&pb, cmd)?,
        Commands::Rewrite(cmd) => rewrite_cue(cmd)?,
    }

    Ok(())
}
