mod cli;
mod runtime;

use anyhow::Result;
use env_logger::Env;
use log::LevelFilter;

fn main() -> Result<()> {
    let command = cli::parse()?;

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if command.verbose() {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    runtime::execute(command)
}
