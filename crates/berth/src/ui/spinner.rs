use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

fn default_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

fn finished_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Spinner on stderr for a single long-running engine call.
///
/// Hidden when stderr is not a terminal so piped output stays clean.
#[derive(Debug)]
pub struct PlainSpinner {
    pb: ProgressBar,
    finished: bool,
}

impl PlainSpinner {
    pub fn start(message: &str) -> Self {
        let pb = if std::io::stderr().is_terminal() {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(default_style());
        pb.set_message(style(message).yellow().to_string());
        Self {
            pb,
            finished: false,
        }
    }

    pub fn finish_with_message(mut self, message: &str) {
        self.pb.set_style(finished_style());
        self.pb
            .finish_with_message(style(message).green().to_string());
        self.finished = true;
    }

    pub fn fail_with_message(mut self, message: &str) {
        self.pb.set_style(finished_style());
        self.pb.finish_with_message(style(message).red().to_string());
        self.finished = true;
    }
}

impl Drop for PlainSpinner {
    fn drop(&mut self) {
        if !self.finished {
            self.pb.finish_and_clear();
        }
    }
}
