// src/main.rs
use clap::Parser;
use tracing::info;

use paperscan::assemble::ConvertMerger;
use paperscan::backend;
use paperscan::cli::Args;
use paperscan::config::{self, Configuration};
use paperscan::device::DeviceDirectory;
use paperscan::logging;
use paperscan::tui::{DialogPrompter, UI};
use paperscan::workflow::Workflow;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    logging::init();

    let config = match &args.config {
        Some(path) => config::load_from_file(path)?,
        None => config::load_default()?.unwrap_or_else(|| {
            info!("No configuration file found, using defaults");
            Configuration::default()
        }),
    };
    config.apply_environment();

    let mut directory = DeviceDirectory::new(backend::from_settings(&config.settings));
    let ui = UI::new(&config.settings.theme);
    let merger = ConvertMerger::new(config.settings.merge_program.clone());
    let mut workflow = Workflow::new(&config, DialogPrompter::new(ui), merger);

    let result = workflow.run(&mut directory);
    // Restore the terminal before any error report is printed
    workflow.prompter().ui().restore();
    drop(workflow);
    drop(directory);

    let outcome = result?;
    info!(?outcome, "Done");
    Ok(())
}
