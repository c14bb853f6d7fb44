//! Terminal rendering of sync events.
//!
//! ```text
//!      Syncing [=========>               ] 3/8
//!  Downloading [=====>                   ]  24% clips/intro.mp4 (48.0 MB)
//! ```

use content_sync::SyncEvent;
use content_sync::util::format_size;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Status verbs, right-aligned to 12 chars.
struct Status;

impl Status {
    const SYNCING: &'static str = "Syncing";
    const DOWNLOADING: &'static str = "Downloading";
    const ERROR: &'static str = "Error";
    const SYNCED: &'static str = "Synced";
    const CANCELLED: &'static str = "Cancelled";
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

pub struct CliProgress {
    multi: MultiProgress,
    overall: Option<ProgressBar>,
    entry: Option<ProgressBar>,
    completed: u64,
    errors: Vec<String>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            overall: None,
            entry: None,
            completed: 0,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn handle(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::TotalCount(total) => {
                let bar = self.multi.add(ProgressBar::new(total as u64));
                bar.set_style(bar_style("{msg:>12.green.bold} [{bar:25.cyan/dim}] {pos}/{len}"));
                bar.set_message(Status::SYNCING);
                self.overall = Some(bar);
            }
            SyncEvent::EntryStarted { url, expected_size } => {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(bar_style(
                    "{msg:>12.green.bold} [{bar:25.green/dim}] {percent:>3}% {prefix:.dim}",
                ));
                bar.set_message(Status::DOWNLOADING);
                let name = url.rsplit('/').next().unwrap_or(url.as_str()).to_owned();
                bar.set_prefix(format!("{name} ({})", format_size(expected_size)));
                self.entry = Some(bar);
            }
            SyncEvent::EntryProgress(percent) => {
                if let Some(bar) = &self.entry {
                    bar.set_position(u64::from(percent));
                }
            }
            SyncEvent::EntryFinished => {
                if let Some(bar) = self.entry.take() {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
                self.completed += 1;
                if let Some(bar) = &self.overall {
                    bar.set_position(self.completed);
                }
            }
            SyncEvent::SessionError(message) => {
                let _ = self
                    .multi
                    .println(format!("{:>12} {message}", Status::ERROR));
                self.errors.push(message);
            }
            SyncEvent::SessionFinished { cancelled } => {
                if let Some(bar) = self.overall.take() {
                    bar.finish_and_clear();
                }
                let status = if cancelled {
                    Status::CANCELLED
                } else {
                    Status::SYNCED
                };
                let _ = self.multi.println(format!(
                    "{status:>12} {} entries, {} errors",
                    self.completed,
                    self.errors.len()
                ));
            }
        }
    }

    #[cfg(test)]
    fn overall_position(&self) -> Option<u64> {
        self.overall.as_ref().map(ProgressBar::position)
    }

    #[cfg(test)]
    fn entry_position(&self) -> Option<u64> {
        self.entry.as_ref().map(ProgressBar::position)
    }
}
