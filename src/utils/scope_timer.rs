use std::time::{Duration, Instant};

/// Logs how long a scope took when it is dropped, at trace level.
#[must_use = "the timer measures until it is dropped"]
pub struct ScopeTimer<'a> {
    label: &'a str,
    started: Instant,
}

impl<'a> ScopeTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ScopeTimer<'_> {
    fn drop(&mut self) {
        log::trace!("{} took {:.2?}", self.label, self.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_grows() {
        let timer = ScopeTimer::new("test scope");
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() > first);
    }
}
