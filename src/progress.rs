//! Optional terminal spinner, compiled in with the `progress` feature.

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
#[cfg(feature = "progress")]
use std::time::Duration;

/// Spinner shown while the staging area is filled and compressed.
///
/// Every method is a no-op when the spinner is disabled.
pub struct Progress {
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl Progress {
    /// A spinner that never draws anything
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "progress")]
            bar: None,
        }
    }

    /// Draw a spinner on stderr when it is an interactive terminal and output is wanted
    pub fn for_terminal(quiet: bool) -> Self {
        if quiet || !std::io::stderr().is_terminal() || is_ci_environment() {
            return Self::disabled();
        }
        Self::spinner()
    }

    #[cfg(feature = "progress")]
    fn spinner() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar) }
    }

    #[cfg(not(feature = "progress"))]
    fn spinner() -> Self {
        Self::disabled()
    }

    #[cfg(feature = "progress")]
    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.into());
        }
    }

    #[cfg(not(feature = "progress"))]
    pub fn set_message(&self, _message: impl Into<String>) {}

    #[cfg(feature = "progress")]
    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    #[cfg(not(feature = "progress"))]
    pub fn is_enabled(&self) -> bool {
        false
    }

    #[cfg(feature = "progress")]
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }

    #[cfg(not(feature = "progress"))]
    pub fn finish(&self) {}
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Check if we're running in a CI environment
fn is_ci_environment() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
        || std::env::var("BUILDKITE").is_ok()
}
