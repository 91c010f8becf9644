/*!
Tolerance policy for pulse-duration classification.

The receive side never sees exact durations: a real transmitter jitters
by well over 100 microseconds while a loopback rig reproduces the nominal
waveform almost exactly. The acceptance window is therefore a
configuration value, not a constant, and the margins below and above the
target can differ.
*/

use serde::{Deserialize, Serialize};

/// Acceptance window around a nominal pulse duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Accepted shortfall below the target, in microseconds
    pub early_micros: u64,
    /// Accepted excess above the target, in microseconds
    pub late_micros: u64,
}

impl Tolerance {
    /// Equal margins on both sides of the target
    pub const fn symmetric(margin_micros: u64) -> Self {
        Self {
            early_micros: margin_micros,
            late_micros: margin_micros,
        }
    }

    /// Independent margins below and above the target
    pub const fn asymmetric(early_micros: u64, late_micros: u64) -> Self {
        Self {
            early_micros,
            late_micros,
        }
    }

    /// Window wide enough for real, jittery remote transmitters
    pub const fn receiver() -> Self {
        Self::asymmetric(150, 250)
    }

    /// Check whether an elapsed duration falls inside the window around `target_micros`
    pub fn allows(&self, elapsed_micros: u64, target_micros: u64) -> bool {
        elapsed_micros >= target_micros.saturating_sub(self.early_micros)
            && elapsed_micros <= target_micros + self.late_micros
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::receiver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::T_MICROS;

    #[test]
    fn test_symmetric_window() {
        let tolerance = Tolerance::symmetric(25);
        assert!(tolerance.allows(T_MICROS, T_MICROS));
        assert!(tolerance.allows(T_MICROS - 25, T_MICROS));
        assert!(tolerance.allows(T_MICROS + 25, T_MICROS));
        assert!(!tolerance.allows(T_MICROS - 26, T_MICROS));
        assert!(!tolerance.allows(T_MICROS + 26, T_MICROS));
    }

    #[test]
    fn test_receiver_window_is_asymmetric() {
        let tolerance = Tolerance::receiver();
        assert!(tolerance.allows(100, T_MICROS));
        assert!(!tolerance.allows(99, T_MICROS));
        assert!(tolerance.allows(500, T_MICROS));
        assert!(!tolerance.allows(501, T_MICROS));
    }

    #[test]
    fn test_short_targets_do_not_underflow() {
        let tolerance = Tolerance::asymmetric(500, 0);
        assert!(tolerance.allows(0, 250));
    }
}
