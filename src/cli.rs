//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "paperscan")]
#[command(about = "Scan documents from a SANE scanner into PDF files")]
#[command(before_help = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Args {
    /// Configuration file to use instead of searching the default locations
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}
