use nix::unistd::alarm;

/// One-shot execution deadline backed by `alarm(2)`.
///
/// Expiry is delivered as `SIGALRM`, which the signal coordinator turns into
/// the `alarm_fired` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutGuard {
    seconds: u32,
}

impl TimeoutGuard {
    /// A guard for `seconds`; 0 means commands never time out.
    pub fn new(seconds: u32) -> Self {
        Self { seconds }
    }

    pub fn is_enabled(&self) -> bool {
        self.seconds > 0
    }

    /// Start the deadline, or cancel any pending one when disabled.
    pub fn arm(&self) {
        if self.is_enabled() {
            alarm::set(self.seconds);
            tracing::trace!(seconds = self.seconds, "deadline armed");
        } else {
            alarm::cancel();
        }
    }

    /// Cancel any pending deadline. Idempotent.
    pub fn disarm(&self) {
        if let Some(left) = alarm::cancel() {
            tracing::trace!(left, "deadline cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_the_deadline() {
        let guard = TimeoutGuard::new(0);
        assert!(!guard.is_enabled());
        assert_eq!(guard, TimeoutGuard { seconds: 0 });
    }

    #[test]
    fn disabled_guard_arms_and_disarms_without_scheduling() {
        let guard = TimeoutGuard::new(0);
        guard.arm();
        guard.disarm();
        guard.disarm();
        assert_eq!(alarm::cancel(), None);
    }
}
