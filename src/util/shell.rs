//! Centralized shell output and progress management.
//!
//! All human-facing output of the CLI goes through [`Shell`]:
//! - Status messages with a right-aligned, colored prefix
//! - A progress bar (via indicatif) while packages are analyzed
//! - JSON mode, where human output is suppressed and commands print
//!   machine-readable documents to stdout instead
//!
//! Human output goes to stderr so that stdout stays clean for artifacts and
//! JSON.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Shell output mode - Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    /// Human-readable output with optional colors and progress bars.
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Machine-readable JSON output only.
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only, no progress
    Quiet,
    /// Status messages + progress bars
    #[default]
    Normal,
    /// --verbose: per-item lines instead of progress bars
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

/// Status types for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success statuses (green)
    Created,
    Updated,
    Fresh,
    Finished,

    // In-progress statuses (cyan)
    Loading,
    Analyzing,
    Generating,
    Checking,

    // Info statuses (blue)
    Info,
    Unchanged,

    // Warning statuses (yellow)
    Stale,
    Removed,
    Warning,

    // Error status (red)
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "Created",
            Status::Updated => "Updated",
            Status::Fresh => "Fresh",
            Status::Finished => "Finished",
            Status::Loading => "Loading",
            Status::Analyzing => "Analyzing",
            Status::Generating => "Generating",
            Status::Checking => "Checking",
            Status::Info => "Info",
            Status::Unchanged => "Unchanged",
            Status::Stale => "Stale",
            Status::Removed => "Removed",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Created | Status::Updated | Status::Fresh | Status::Finished => "\x1b[1;32m",
            Status::Loading | Status::Analyzing | Status::Generating | Status::Checking => {
                "\x1b[1;36m"
            }
            Status::Info | Status::Unchanged => "\x1b[1;34m",
            Status::Stale | Status::Removed | Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

/// Width of the right-aligned status column.
const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    /// Create a new shell with the given mode.
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell { mode, use_color }
    }

    /// Create a shell from CLI flags. JSON takes precedence over verbosity.
    pub fn from_flags(verbose: bool, no_color: bool, json: bool) -> Self {
        let mode = if json {
            ShellMode::Json
        } else {
            ShellMode::Human {
                verbosity: if verbose {
                    Verbosity::Verbose
                } else {
                    Verbosity::Normal
                },
                color: if no_color {
                    ColorChoice::Never
                } else {
                    ColorChoice::Auto
                },
            }
        };

        Shell::new(mode)
    }

    /// Get the current shell mode.
    pub fn mode(&self) -> &ShellMode {
        &self.mode
    }

    /// Check if shell is in quiet mode.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    /// Check if shell is in JSON mode.
    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Check if colors are enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a status message: `{status:>12} {message}`.
    ///
    /// In quiet mode only errors are printed; in JSON mode nothing is.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() {
            return;
        }

        if self.is_quiet() && status != Status::Error {
            return;
        }

        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print an info message.
    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print a JSON document to stdout. Ignored in human mode.
    pub fn json(&self, value: &serde_json::Value) {
        if !self.is_json() {
            return;
        }

        let json_str = serde_json::to_string_pretty(value).unwrap_or_default();
        println!("{}", json_str);
        let _ = io::stdout().flush();
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();

        if self.use_color {
            format!("{}{:>width$}\x1b[0m", status.color_code(), text, width = STATUS_WIDTH)
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Create a progress bar.
    ///
    /// Hidden in quiet, verbose and JSON modes, and when stderr is not a
    /// terminal.
    pub fn progress(self: &Arc<Self>, total: u64, msg: impl Display) -> Progress {
        Progress::new(Arc::clone(self), total, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// Progress bar wrapper that respects shell mode.
///
/// Safe to advance from rayon workers.
pub struct Progress {
    shell: Arc<Shell>,
    pb: Option<ProgressBar>,
    total: u64,
    current: AtomicU64,
}

impl Progress {
    fn new(shell: Arc<Shell>, total: u64, message: String) -> Self {
        let visible = !(shell.is_quiet() || shell.is_verbose() || shell.is_json())
            && io::stderr().is_terminal()
            && total > 1;

        let pb = visible.then(|| {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(message);
            pb
        });

        Progress {
            shell,
            pb,
            total,
            current: AtomicU64::new(0),
        }
    }

    /// Advance by one finished item.
    pub fn tick(&self, item: impl Display) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(pb) = &self.pb {
            pb.inc(1);
        }

        if self.shell.is_verbose() {
            eprintln!("  {} [{}/{}]", item, current, self.total);
        }
    }

    /// Get the current position.
    pub fn position(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
