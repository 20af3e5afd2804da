use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SetupError;

/// Shared interrupt flag. The signal handler raises it; long-running steps poll it.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fails with [`SetupError::Cancelled`] once the flag is raised
    pub fn check(&self) -> Result<(), SetupError> {
        if self.is_cancelled() {
            Err(SetupError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let cancel = Cancellation::new();
        let handler_side = cancel.clone();
        assert!(cancel.check().is_ok());

        handler_side.cancel();

        assert!(cancel.is_cancelled());
        assert!(matches!(cancel.check(), Err(SetupError::Cancelled)));
    }
}
