//! Terminal styling for makesound status output

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Check if terminal supports colors
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

fn stderr_supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stderr).is_some()
}

/// Print a success message
pub fn print_success(message: &str) {
    if supports_color() {
        println!("{} {}", "✓".bright_green().bold(), message.green());
    } else {
        println!("[OK] {}", message);
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    if stderr_supports_color() {
        eprintln!("{} {}", "✗".bright_red().bold(), message.red());
    } else {
        eprintln!("[ERR] {}", message);
    }
}

/// Print an info message
pub fn print_info(message: &str) {
    if supports_color() {
        println!("{} {}", "ℹ".bright_blue().bold(), message.bright_white());
    } else {
        println!("{}", message);
    }
}

/// Print a hint for the next command to run
pub fn print_hint(command: &str) {
    if supports_color() {
        println!("{} {}", "Run:".bright_black(), command.bright_cyan());
    } else {
        println!("Run: {}", command);
    }
}

/// Spinner shown while the model loads
///
/// Draws to stderr and stays hidden when stderr is not a terminal.
pub fn loading_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
