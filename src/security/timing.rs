//! Timing protection for credential checks
//!
//! An unknown email skips the password hash entirely and would answer much
//! faster than a wrong password. Failed logins therefore wait out a common
//! minimum duration before they are answered.

use std::time::{Duration, Instant};

/// Minimum duration a failed login takes, measured from `start`
pub struct FailureFloor {
    start: Instant,
    floor: Duration,
}

impl FailureFloor {
    pub fn start(floor: Duration) -> Self {
        Self {
            start: Instant::now(),
            floor,
        }
    }

    /// Sleeps for whatever is left of the floor
    pub async fn hold(self) {
        let elapsed = self.start.elapsed();
        if elapsed < self.floor {
            tokio::time::sleep(self.floor - elapsed).await;
        }
    }
}
