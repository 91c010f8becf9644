/*!
Hardware seams: output line and monotonic clock, plus a simulated rig.

The transmit path needs exactly two collaborators from the platform: a
line it can drive high or low, and a monotonic microsecond clock it can
busy-wait against. Both are traits here so the same waveform code runs
against a physical pin or against the virtual rig used by the apps and
tests.
*/

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A single level transition on a radio line.
///
/// The unit of edge traces exchanged between the transmit and receive
/// tools: the transmitter records them, the replay capture source feeds
/// them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Line level after the transition
    pub level: bool,
    /// Monotonic timestamp of the transition in microseconds
    pub at_micros: u64,
}

/// A line the transmitter can drive.
pub trait OutputLine {
    /// Drive the line to `level`
    fn set_level(&mut self, level: bool);
}

/// Monotonic microsecond clock.
pub trait MonotonicClock {
    /// Current monotonic timestamp in microseconds
    fn now_micros(&self) -> u64;

    /// Tight poll until `micros` have elapsed.
    ///
    /// Occupies the calling thread for the full duration; sub-millisecond
    /// waveform accuracy rules out any preemption-tolerant sleep.
    fn busy_wait_micros(&self, micros: u64) {
        let start = self.now_micros();
        while self.now_micros().saturating_sub(start) < micros {
            std::hint::spin_loop();
        }
    }
}

/// Monotonic clock backed by [`std::time::Instant`].
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Clock whose busy-waits complete instantly by advancing simulated time.
///
/// Clones share the same time source, so a clock handed to a transmitter
/// stays readable from the outside.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Rc<Cell<u64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(micros: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(micros)),
        }
    }

    /// Move simulated time forward
    pub fn advance(&self, micros: u64) {
        self.now.set(self.now.get() + micros);
    }
}

impl MonotonicClock for VirtualClock {
    fn now_micros(&self) -> u64 {
        self.now.get()
    }

    fn busy_wait_micros(&self, micros: u64) {
        self.advance(micros);
    }
}

/// Output line that records every distinct level transition with a
/// timestamp taken from a [`VirtualClock`].
pub struct RecordingLine {
    clock: VirtualClock,
    level: bool,
    edges: Vec<Edge>,
}

impl RecordingLine {
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            level: false,
            edges: Vec::new(),
        }
    }

    /// Transitions recorded so far
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Drain the recorded transitions
    pub fn take_edges(&mut self) -> Vec<Edge> {
        std::mem::take(&mut self.edges)
    }
}

impl OutputLine for RecordingLine {
    fn set_level(&mut self, level: bool) {
        if level == self.level {
            return;
        }
        self.level = level;
        self.edges.push(Edge {
            level,
            at_micros: self.clock.now_micros(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_busy_wait_advances() {
        let clock = VirtualClock::starting_at(100);
        clock.busy_wait_micros(250);
        assert_eq!(clock.now_micros(), 350);
    }

    #[test]
    fn test_virtual_clock_clones_share_time() {
        let clock = VirtualClock::new();
        let other = clock.clone();
        clock.advance(42);
        assert_eq!(other.now_micros(), 42);
    }

    #[test]
    fn test_recording_line_captures_transitions_once() {
        let clock = VirtualClock::new();
        let mut line = RecordingLine::new(clock.clone());

        line.set_level(false); // already low, nothing recorded
        line.set_level(true);
        clock.advance(250);
        line.set_level(true); // no change, nothing recorded
        line.set_level(false);

        assert_eq!(
            line.take_edges(),
            vec![
                Edge {
                    level: true,
                    at_micros: 0
                },
                Edge {
                    level: false,
                    at_micros: 250
                },
            ]
        );
        assert!(line.edges().is_empty());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_micros();
        clock.busy_wait_micros(100);
        assert!(clock.now_micros() >= first + 100);
    }
}
