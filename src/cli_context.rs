use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use crate::cli_format::OutputFormat;
use crate::Cli;
use quarry::{EngineSession, Subscription};

/// CLI context passed to all commands
pub(crate) struct CliContext {
    pub(crate) format: OutputFormat,
    show_progress: bool,
}

/// Progress bar fed by session state changes
pub(crate) struct LoadProgress {
    bar: ProgressBar,
    _subscription: Subscription,
}

impl LoadProgress {
    /// Remove the bar from the terminal
    pub(crate) fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl CliContext {
    pub(crate) fn new(cli: &Cli) -> Self {
        // Color is enabled if: not disabled via flag AND stdout is a terminal
        let use_color = !cli.no_color && std::io::stdout().is_terminal();

        // Control the colored crate's behavior
        if !use_color {
            colored::control::set_override(false);
        }

        Self {
            format: cli.format,
            show_progress: !cli.quiet && std::io::stderr().is_terminal(),
        }
    }

    /// Show a byte progress bar for table loads until the returned handle
    /// is finished or dropped
    pub(crate) fn track_loads(&self, session: &EngineSession) -> Option<LoadProgress> {
        if !self.show_progress {
            return None;
        }

        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} {msg:24} [{bar:30.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let sink = bar.clone();
        let subscription = session.subscribe(move |state| {
            if state.total_bytes > 0 {
                sink.set_length(state.total_bytes);
            }
            sink.set_position(state.loaded_bytes);
            if let Some(message) = &state.message {
                sink.set_message(message.clone());
            }
        });

        Some(LoadProgress {
            bar,
            _subscription: subscription,
        })
    }

    /// Print success message
    pub(crate) fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print error message
    pub(crate) fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print warning message
    pub(crate) fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print info message
    pub(crate) fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".blue(), message);
    }
}
