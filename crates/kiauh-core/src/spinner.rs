use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Animation frames; the trailing blank is shown once the spinner is finished.
const TICK_CHARS: &str = "◜◝◞◟ ";

/// Console spinner shown while blocking work runs.
///
/// Dropping the spinner clears it, so every exit path of the decorated work leaves the
/// console clean.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        Self::with_delay(message, Duration::from_millis(200))
    }

    pub fn with_delay(message: &str, delay: Duration) -> Self {
        let bar = ProgressBar::new_spinner()
            .with_style(ProgressStyle::default_spinner().tick_chars(TICK_CHARS))
            .with_message(format!("{message} ..."));
        bar.enable_steady_tick(delay);
        Self { bar }
    }

    pub fn stop(self) {
        self.bar.finish_and_clear();
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Run `f` with a spinner showing `message`.
pub fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> T {
    let _spinner = Spinner::start(message);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_on_every_exit_path() {
        let spinner = Spinner::with_delay("working", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(!spinner.is_finished());
        spinner.stop();

        let result: Result<(), &str> = with_spinner("failing", || Err("boom"));
        assert_eq!(result, Err("boom"));
    }
}
