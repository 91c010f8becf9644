/*!
Condition-based telegram synchronization state machine.

The high-level half of the decode pipeline: consumes the condition
stream produced by the bit-timing detector, pairs physical bits into
logical bits, and assembles complete 32-bit frames between a sync and
the following pause.

Noise tolerance is the whole point of this machine. Anything before a
valid sync is ignored, any out-of-sequence condition drops the partial
telegram and falls back to waiting for the next sync, and a pause
closing a telegram with the wrong bit count discards it. Repeated
transmissions mean the next intact telegram is rarely far away.
*/

use tracing::{debug, info};

use shared::protocol::TELEGRAM_BITS;
use shared::{Condition, Frame};

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramSyncState {
    /// Discarding conditions until a sync opens a telegram
    WaitSync,
    /// Between logical bits: mark or space opens a bit, pause closes the telegram
    WaitBitStart,
    /// Saw the mark half of a logical 1, expecting the space half
    WaitSpace,
    /// Saw the space half of a logical 0, expecting the mark half
    WaitMark,
}

/// Statistics counters maintained by the engine
#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramSyncStats {
    /// Frames assembled and emitted
    pub frames_completed: u64,
    /// Out-of-sequence conditions that dropped a partial telegram
    pub protocol_violations: u64,
    /// Telegrams closed by a pause with a bit count other than 32
    pub short_frames: u64,
    /// Physical bit error conditions observed, in any state
    pub physical_errors: u64,
}

/// Telegram assembly engine.
pub struct TelegramSyncEngine {
    state: TelegramSyncState,
    bits: u32,
    bit_count: usize,
    stats: TelegramSyncStats,
}

impl TelegramSyncEngine {
    pub fn new() -> Self {
        Self {
            state: TelegramSyncState::WaitSync,
            bits: 0,
            bit_count: 0,
            stats: TelegramSyncStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> TelegramSyncState {
        self.state
    }

    /// Get statistics
    pub fn stats(&self) -> TelegramSyncStats {
        self.stats
    }

    fn begin_telegram(&mut self) {
        self.bits = 0;
        self.bit_count = 0;
        self.state = TelegramSyncState::WaitBitStart;
    }

    fn resync(&mut self, got: Condition, expected: &str) {
        self.stats.protocol_violations += 1;
        debug!(
            "Protocol violation: got {} expecting {}, dropping {} bits and waiting for sync",
            got.as_str(),
            expected,
            self.bit_count
        );
        self.state = TelegramSyncState::WaitSync;
    }

    fn push_bit(&mut self, value: bool) {
        if value && self.bit_count < TELEGRAM_BITS {
            self.bits |= 1 << self.bit_count;
        }
        self.bit_count += 1;
        self.state = TelegramSyncState::WaitBitStart;
    }

    /// Consume one condition; returns a frame when a telegram completes.
    pub fn process_condition(&mut self, condition: Condition) -> Option<Frame> {
        if condition.is_error() {
            self.stats.physical_errors += 1;
        }

        match self.state {
            TelegramSyncState::WaitSync => {
                // Noise before a valid sync is expected, not an error
                if condition == Condition::Sync {
                    self.begin_telegram();
                }
                None
            }

            TelegramSyncState::WaitBitStart => match condition {
                Condition::Mark => {
                    self.state = TelegramSyncState::WaitSpace;
                    None
                }
                Condition::Space => {
                    self.state = TelegramSyncState::WaitMark;
                    None
                }
                Condition::Pause => {
                    let bit_count = self.bit_count;
                    self.state = TelegramSyncState::WaitSync;
                    if bit_count == TELEGRAM_BITS {
                        let frame = Frame::from_bits(self.bits);
                        self.stats.frames_completed += 1;
                        info!("✅ Telegram complete: {}", frame);
                        Some(frame)
                    } else {
                        self.stats.short_frames += 1;
                        debug!("Dropping telegram closed after {} bits", bit_count);
                        None
                    }
                }
                other => {
                    self.resync(other, "mark, space or pause");
                    None
                }
            },

            TelegramSyncState::WaitSpace => {
                if condition == Condition::Space {
                    self.push_bit(true);
                } else {
                    self.resync(condition, "space");
                }
                None
            }

            TelegramSyncState::WaitMark => {
                if condition == Condition::Mark {
                    self.push_bit(false);
                } else {
                    self.resync(condition, "mark");
                }
                None
            }
        }
    }
}

impl Default for TelegramSyncEngine {
    fn default() -> Self {
        Self::new()
    }
}
