#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used
)]

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod args;
mod bootptab;
mod command;
mod config;
mod dhcp_parsers;
mod error;
mod interfaces;
mod macaddr;
mod menu;
mod model;
mod monitor;
mod plist;
mod service;

use args::Args;
use command::SystemRunner;
use config::Config;
use eyre::Result;
use menu::Menu;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::new();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bootpd_ctl={}", args.log_filter())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from(&args);
    tracing::debug!("{config:?}");

    let input = BufReader::new(tokio::io::stdin()).lines();
    let mut menu = Menu::new(config, SystemRunner, input, std::io::stdout());
    menu.run().await?;

    Ok(())
}
