//! Terminal output utilities
//!
//! Provides consistent formatting for CLI output.

use gradle_ci_core::error::Error;
use owo_colors::{OwoColorize, Stream};

/// Force colours off, e.g. for `--no-color`
pub fn disable_colors() {
    owo_colors::set_override(false);
}

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        eprintln!(
            "{} {}",
            "✓".if_supports_color(Stream::Stderr, |t| t.green()),
            message
        );
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!(
            "{} {}",
            "✗".if_supports_color(Stream::Stderr, |t| t.red()),
            message
        );
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!(
            "{} {}",
            "⚠".if_supports_color(Stream::Stderr, |t| t.yellow()),
            message
        );
    }

    /// Print an info message
    pub fn info(message: &str) {
        eprintln!(
            "{} {}",
            "ℹ".if_supports_color(Stream::Stderr, |t| t.blue()),
            message
        );
    }

    /// Print a header
    pub fn header(message: &str) {
        eprintln!();
        eprintln!("{}", message.if_supports_color(Stream::Stderr, |t| t.bold()));
        eprintln!("{}", "─".repeat(message.chars().count()));
    }

    /// Print an error with its context and suggestion on separate lines
    pub fn failure(error: &Error) {
        Self::error(&format!("[{}] {}", error.code, error.message));
        if let Some(context) = &error.context {
            eprintln!("  {}", context.if_supports_color(Stream::Stderr, |t| t.dimmed()));
        }
        if let Some(suggestion) = &error.suggestion {
            eprintln!(
                "  {} {}",
                "hint:".if_supports_color(Stream::Stderr, |t| t.cyan()),
                suggestion
            );
        }
    }
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

/// Format a count with singular/plural
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
