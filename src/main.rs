mod app;
mod cli;
mod config;
mod deleter;
mod errors;
mod hardware;
mod logger;
mod orphans;
mod scanner;
mod ui;
mod update;
mod wow;
mod wtf;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
