//! Kodegen Bundler Appcast - DMG packaging and appcast publishing for macOS apps.
//!
//! This binary builds the DMG, records the release in the appcast feed and
//! uploads both, exiting with a code that classifies any failure.

use std::process;

#[tokio::main]
async fn main() {
    // Run CLI and get exit code
    let exit_code = match kodegen_bundler_appcast::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
