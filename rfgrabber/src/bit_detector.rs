/*!
Bit-timing detection for the on-off-keyed receive line.

This is the low-level half of the decode pipeline: it classifies raw
level transitions into conditions (mark, space, sync, pause or a
physical bit error) by measuring the elapsed time between edges. In a
deployment it runs inside the edge-interrupt context, so it never
blocks, never allocates and completes in constant time; pushing the
resulting condition onto the queue is left to the caller.

Each monitored line needs its own detector instance: the state below
persists across invocations and must never be shared between lines.
*/

use tracing::trace;

use shared::protocol::{
    MARK_LOW_MICROS, PAUSE_GUARD_MICROS, PAUSE_LOW_MICROS, SPACE_LOW_MICROS, SYNC_LOW_MICROS,
    T_MICROS,
};
use shared::{Condition, Tolerance};

/// Detector state persisted across edge invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDetectorState {
    /// Idle low, waiting for a rising edge to open a pulse
    WaitBitStart,
    /// High phase open, waiting for the falling edge
    WaitHighToLow,
    /// Low phase open, waiting for the rising edge that decides the pulse
    WaitLowDecision,
}

/// Statistics counters maintained by the detector
#[derive(Debug, Clone, Copy, Default)]
pub struct BitDetectorStats {
    /// Conditions emitted, errors included
    pub conditions: u64,
    /// Unexpected edge polarities
    pub edge_errors: u64,
    /// Out-of-tolerance durations
    pub timing_errors: u64,
    /// Invocations suppressed because the level did not change
    pub duplicate_edges: u64,
}

/// Edge-timing classifier for one receive line.
pub struct BitDetector {
    state: BitDetectorState,
    prev_level: bool,
    last_rising_micros: u64,
    last_falling_micros: u64,
    tolerance: Tolerance,
    stats: BitDetectorStats,
}

impl BitDetector {
    /// Create a detector for a line that idles low
    pub fn new(tolerance: Tolerance) -> Self {
        Self::with_initial_level(tolerance, false)
    }

    /// Create a detector with a known starting line level
    pub fn with_initial_level(tolerance: Tolerance, level: bool) -> Self {
        Self {
            state: BitDetectorState::WaitBitStart,
            prev_level: level,
            last_rising_micros: 0,
            last_falling_micros: 0,
            tolerance,
            stats: BitDetectorStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> BitDetectorState {
        self.state
    }

    /// Get statistics
    pub fn stats(&self) -> BitDetectorStats {
        self.stats
    }

    /// Classify one level transition.
    ///
    /// `level` is the line level after the edge, `now_micros` a monotonic
    /// timestamp of the edge. Returns the condition this edge decided, if
    /// any; spurious invocations repeating the previous level are
    /// suppressed.
    pub fn process_edge(&mut self, level: bool, now_micros: u64) -> Option<Condition> {
        if level == self.prev_level {
            self.stats.duplicate_edges += 1;
            return None;
        }
        self.prev_level = level;
        let rising = level;

        let condition = match self.state {
            BitDetectorState::WaitBitStart => {
                if rising {
                    self.last_rising_micros = now_micros;
                    self.state = BitDetectorState::WaitHighToLow;
                    None
                } else {
                    Some(Condition::BadEdgeAfterStart)
                }
            }

            BitDetectorState::WaitHighToLow => {
                if !rising {
                    let elapsed = now_micros.saturating_sub(self.last_rising_micros);
                    if self.tolerance.allows(elapsed, T_MICROS) {
                        self.last_falling_micros = now_micros;
                        self.state = BitDetectorState::WaitLowDecision;
                        None
                    } else {
                        self.state = BitDetectorState::WaitBitStart;
                        Some(Condition::BadHighDuration)
                    }
                } else {
                    self.state = BitDetectorState::WaitBitStart;
                    Some(Condition::BadEdgeAfterHigh)
                }
            }

            BitDetectorState::WaitLowDecision => {
                let condition = if rising {
                    let elapsed = now_micros.saturating_sub(self.last_falling_micros);
                    if self.tolerance.allows(elapsed, MARK_LOW_MICROS) {
                        Condition::Mark
                    } else if self.tolerance.allows(elapsed, SPACE_LOW_MICROS) {
                        Condition::Space
                    } else if self.tolerance.allows(elapsed, SYNC_LOW_MICROS) {
                        Condition::Sync
                    } else if elapsed > PAUSE_LOW_MICROS - PAUSE_GUARD_MICROS {
                        Condition::Pause
                    } else {
                        Condition::BadLowDuration
                    }
                } else {
                    Condition::BadEdgeAfterLow
                };

                // Whatever was decided, this edge opens the next pulse's
                // high phase: accepted and rejected low phases alike
                // resynchronize the detector.
                self.last_rising_micros = now_micros;
                self.state = BitDetectorState::WaitHighToLow;
                Some(condition)
            }
        };

        if let Some(condition) = condition {
            self.stats.conditions += 1;
            if condition.is_edge_error() {
                self.stats.edge_errors += 1;
            }
            if condition.is_timing_error() {
                self.stats.timing_errors += 1;
            }
            trace!("Edge at {}us -> {}", now_micros, condition.as_str());
        }
        condition
    }
}
