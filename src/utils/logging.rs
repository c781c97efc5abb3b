// file: src/utils/logging.rs
// description: Tracing subscriber initialization and colored status line helpers

use colored::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init_logger(colored_output: bool, verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .with_ansi(colored_output);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    if !colored_output {
        colored::control::set_override(false);
    }
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}

pub fn format_skip(msg: &str) -> String {
    format!("{} {}", "⊘".dimmed(), msg.dimmed())
}

pub fn format_step(step: usize, total: usize, msg: &str) -> String {
    format!("{} {}", format!("[{}/{}]", step, total).cyan().bold(), msg)
}

pub fn format_banner(title: &str) -> String {
    let rule = "=".repeat(60);
    format!("{}\n{}\n{}", rule, title.bold(), rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines_keep_message() {
        colored::control::set_override(false);
        assert_eq!(format_success("sent"), "✓ sent");
        assert_eq!(format_skip("already delivered"), "⊘ already delivered");
        assert_eq!(format_step(2, 3, "Generating"), "[2/3] Generating");
    }
}
