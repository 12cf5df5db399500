//! CLI-specific progress handling for giro
//!
//! Planning spends most of its time waiting on graph fetches, so the CLI
//! shows a spinner rather than a bar; there is no meaningful total to count
//! toward.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Create a steadily ticking spinner with the given message
pub fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("Failed to create progress style"),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
