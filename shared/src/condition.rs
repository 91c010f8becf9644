/*!
Receive-line condition vocabulary.

A condition is one classified event produced by the bit-timing detector:
either a recognized pulse (mark, space, sync, pause) or one of the
physical bit errors, each of which identifies the specific edge or timing
expectation that failed.
*/

use serde::{Deserialize, Serialize};

/// A classified event on the monitored receive line.
///
/// The detector emits exactly one condition per qualifying edge decision.
/// Error variants are diagnostic data, not failures: the telegram decoder
/// treats them as protocol violations and resynchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Low phase of one unit: first half of a logical 1, second half of a logical 0
    Mark,
    /// Low phase of five units: first half of a logical 0, second half of a logical 1
    Space,
    /// Low phase of ten units: telegram start
    Sync,
    /// Low phase of at least forty units: telegram end
    Pause,
    /// Falling edge while waiting for a pulse to start
    BadEdgeAfterStart,
    /// Rising edge while the high phase was still open
    BadEdgeAfterHigh,
    /// Falling edge while the low phase was still open
    BadEdgeAfterLow,
    /// High phase outside the tolerance window around one unit
    BadHighDuration,
    /// Low phase matching none of the classification windows
    BadLowDuration,
}

impl Condition {
    /// Check if this condition reports a physical bit error
    pub fn is_error(self) -> bool {
        self.is_edge_error() || self.is_timing_error()
    }

    /// Check if this condition reports an unexpected edge polarity
    pub fn is_edge_error(self) -> bool {
        matches!(
            self,
            Self::BadEdgeAfterStart | Self::BadEdgeAfterHigh | Self::BadEdgeAfterLow
        )
    }

    /// Check if this condition reports an out-of-tolerance duration
    pub fn is_timing_error(self) -> bool {
        matches!(self, Self::BadHighDuration | Self::BadLowDuration)
    }

    /// Short name for logs and diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mark => "mark",
            Self::Space => "space",
            Self::Sync => "sync",
            Self::Pause => "pause",
            Self::BadEdgeAfterStart => "bad_edge_after_start",
            Self::BadEdgeAfterHigh => "bad_edge_after_high",
            Self::BadEdgeAfterLow => "bad_edge_after_low",
            Self::BadHighDuration => "bad_high_duration",
            Self::BadLowDuration => "bad_low_duration",
        }
    }
}
