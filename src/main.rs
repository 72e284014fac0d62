use std::process::ExitCode;

use clap::Parser;
use eframe::egui;

use perlerpad::app::PerlerPadApp;
use perlerpad::cli::{self, CliArgs};
use perlerpad::logger;

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if CliArgs::is_cli_mode() {
        return cli::run(CliArgs::parse());
    }

    // -- GUI mode -----------------------------------------------------
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("PerlerPad"),
        ..Default::default()
    };

    match eframe::run_native(
        "PerlerPad",
        options,
        Box::new(|cc| Box::new(PerlerPadApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            perlerpad::log_err!("eframe exited with error: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
