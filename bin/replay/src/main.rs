#![doc = include_str!("../README.md")]

use anyhow::Result;
use clap::Parser;

mod cli;
mod fixture;
mod providers;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Cli::parse().init_telemetry()?.run().await
}
