/*!
Telegram waveform generation.

The transmit dual of the bit-timing detector: renders a frame as the
exact pulse sequence a compliant receiver decodes. Every pulse is one
unit high followed by a variable low phase; a telegram is a sync pulse,
the 32 logical bits encoded as physical bit pairs, and the closing
pause.

Timing is paced by busy-waiting on the clock, so one `transmit` call
occupies the calling thread for the telegram's full duration (77 ms at
the nominal unit). It must not share a line with an active detector.
*/

use tracing::debug;

use crate::frame::Frame;
use crate::line::{MonotonicClock, OutputLine};
use crate::protocol::{
    MARK_LOW_MICROS, PAUSE_LOW_MICROS, SPACE_LOW_MICROS, SYNC_LOW_MICROS, TELEGRAM_BITS, T_MICROS,
};

/// Drives an output line through the timed pulse sequence of a telegram.
pub struct WaveformTransmitter<L: OutputLine, C: MonotonicClock> {
    line: L,
    clock: C,
    telegrams_sent: u64,
}

impl<L: OutputLine, C: MonotonicClock> WaveformTransmitter<L, C> {
    pub fn new(line: L, clock: C) -> Self {
        Self {
            line,
            clock,
            telegrams_sent: 0,
        }
    }

    /// Telegrams transmitted so far
    pub fn telegrams_sent(&self) -> u64 {
        self.telegrams_sent
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    /// Give the line back, consuming the transmitter
    pub fn into_line(self) -> L {
        self.line
    }

    /// One unit high, then `low_micros` low
    fn pulse(&mut self, low_micros: u64) {
        self.line.set_level(true);
        self.clock.busy_wait_micros(T_MICROS);
        self.line.set_level(false);
        self.clock.busy_wait_micros(low_micros);
    }

    fn transmit_sync(&mut self) {
        self.pulse(SYNC_LOW_MICROS);
    }

    fn transmit_pause(&mut self) {
        self.pulse(PAUSE_LOW_MICROS);
    }

    fn transmit_physical_bit(&mut self, value: bool) {
        self.pulse(if value {
            MARK_LOW_MICROS
        } else {
            SPACE_LOW_MICROS
        });
    }

    /// A logical bit is two physical bits, the second the inverse of the
    /// first: 1 goes out as 10, 0 as 01
    fn transmit_logical_bit(&mut self, value: bool) {
        self.transmit_physical_bit(value);
        self.transmit_physical_bit(!value);
    }

    /// Transmit one complete telegram for `frame`.
    ///
    /// Receivers expect several identical telegrams per keypress; the
    /// repetition policy belongs to the caller, see
    /// [`transmit_repeated`](Self::transmit_repeated).
    pub fn transmit(&mut self, frame: &Frame) {
        let bits = frame.to_bits();

        self.transmit_sync();
        for position in 0..TELEGRAM_BITS {
            self.transmit_logical_bit(bits >> position & 1 == 1);
        }
        self.transmit_pause();

        self.telegrams_sent += 1;
        debug!("Telegram sent: {} (bits {:08X})", frame, bits);
    }

    /// Transmit `repeats` identical telegrams back to back
    pub fn transmit_repeated(&mut self, frame: &Frame, repeats: u32) {
        for _ in 0..repeats {
            self.transmit(frame);
        }
    }
}
