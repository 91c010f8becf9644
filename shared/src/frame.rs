/*!
Remote-control command frames and their 32-bit wire packing.

A frame is the decoded payload of one telegram: the transmitter-unique
station code plus the flags and selectors addressing a receiver. The
32 logical bits of a telegram map to the frame fields in the order they
cross the air, station id first.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SharedError};
use crate::protocol::STATION_ID_BITS;

/// Wire value of the state bit that switches a unit off (on is 0)
pub const STATE_BIT_OFF: bool = true;

/// Mask of the significant station identifier bits
pub const STATION_ID_MASK: u32 = (1 << STATION_ID_BITS) - 1;

/// A decoded remote-control command.
///
/// Logical-bit layout, in transmission order (position 0 first):
/// station id at positions 0-25 least-significant-bit first, group at 26,
/// state at 27, channel at 28-29 and unit at 30-31, each pair
/// higher-order bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Transmitter-unique code the receiver pairs against (26 bits)
    pub station_id: u32,
    /// Group flag: the command addresses every unit paired to the station
    pub group: bool,
    /// Raw state bit: 0 switches on, 1 switches off
    pub state: bool,
    /// Channel selector (2 bits). Nexa remotes use 0b11
    pub channel: u8,
    /// Unit selector (2 bits). Nexa unit #1 is 0b11, #2 is 0b10, #3 is 0b01
    pub unit: u8,
}

impl Frame {
    /// Create a frame, validating field ranges
    pub fn new(station_id: u32, group: bool, state: bool, channel: u8, unit: u8) -> Result<Self> {
        if station_id > STATION_ID_MASK {
            return Err(SharedError::invalid_frame(format!(
                "station id 0x{:X} exceeds {} bits",
                station_id, STATION_ID_BITS
            )));
        }
        if channel > 0b11 {
            return Err(SharedError::invalid_frame(format!(
                "channel {} exceeds 2 bits",
                channel
            )));
        }
        if unit > 0b11 {
            return Err(SharedError::invalid_frame(format!(
                "unit {} exceeds 2 bits",
                unit
            )));
        }
        Ok(Self {
            station_id,
            group,
            state,
            channel,
            unit,
        })
    }

    /// Whether this command switches the addressed unit on
    pub fn is_on(&self) -> bool {
        self.state != STATE_BIT_OFF
    }

    /// Pack the frame into its 32 logical bits, position 0 in bit 0
    pub fn to_bits(&self) -> u32 {
        let mut bits = self.station_id & STATION_ID_MASK;
        if self.group {
            bits |= 1 << 26;
        }
        if self.state {
            bits |= 1 << 27;
        }
        // Channel and unit pairs go out higher-order bit first
        bits |= ((self.channel as u32 >> 1) & 1) << 28;
        bits |= (self.channel as u32 & 1) << 29;
        bits |= ((self.unit as u32 >> 1) & 1) << 30;
        bits |= (self.unit as u32 & 1) << 31;
        bits
    }

    /// Unpack a frame from 32 accumulated logical bits
    pub fn from_bits(bits: u32) -> Self {
        Self {
            station_id: bits & STATION_ID_MASK,
            group: bits & (1 << 26) != 0,
            state: bits & (1 << 27) != 0,
            channel: ((bits >> 28 & 1) << 1 | bits >> 29 & 1) as u8,
            unit: ((bits >> 30 & 1) << 1 | bits >> 31 & 1) as u8,
        }
    }
}

/// Parse a station identifier from a decimal or 0x-prefixed hex string
pub fn parse_station_id(s: &str) -> std::result::Result<u32, String> {
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
    .map_err(|e| format!("invalid station id '{}': {}", s, e))?;

    if value > STATION_ID_MASK {
        return Err(format!("station id 0x{:X} exceeds 26 bits", value));
    }
    Ok(value)
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "station 0x{:07X} group={} state={} channel={} unit={}",
            self.station_id,
            self.group as u8,
            if self.is_on() { "on" } else { "off" },
            self.channel,
            self.unit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_validation() {
        assert!(Frame::new(0x200A55A, false, true, 0b11, 0b11).is_ok());
        assert!(Frame::new(1 << 26, false, false, 0, 0).is_err());
        assert!(Frame::new(0, false, false, 4, 0).is_err());
        assert!(Frame::new(0, false, false, 0, 4).is_err());
    }

    #[test]
    fn test_reference_packing() {
        let frame = Frame::new(0x200A55A, false, true, 0b11, 0b11).unwrap();
        assert_eq!(frame.to_bits(), 0xFA00_A55A);
        assert_eq!(Frame::from_bits(0xFA00_A55A), frame);
    }

    #[test]
    fn test_bits_roundtrip() {
        let frame = Frame::new(0x155_5555, true, false, 0b01, 0b10).unwrap();
        assert_eq!(Frame::from_bits(frame.to_bits()), frame);
    }

    #[test]
    fn test_pair_bit_order() {
        // Higher-order channel bit is transmitted first, i.e. sits at the
        // lower logical position.
        let frame = Frame::new(0, false, false, 0b10, 0b01).unwrap();
        let bits = frame.to_bits();
        assert_eq!(bits >> 28 & 1, 1);
        assert_eq!(bits >> 29 & 1, 0);
        assert_eq!(bits >> 30 & 1, 0);
        assert_eq!(bits >> 31 & 1, 1);
    }

    #[test]
    fn test_parse_station_id() {
        assert_eq!(parse_station_id("0x200A55A").unwrap(), 0x200A55A);
        assert_eq!(parse_station_id("42").unwrap(), 42);
        assert!(parse_station_id("0x4000000").is_err());
        assert!(parse_station_id("bogus").is_err());
    }

    #[test]
    fn test_state_convention() {
        let on = Frame::new(1, false, !STATE_BIT_OFF, 3, 3).unwrap();
        let off = Frame::new(1, false, STATE_BIT_OFF, 3, 3).unwrap();
        assert!(on.is_on());
        assert!(!off.is_on());
    }
}
