//! Channel addressing.
//!
//! Protocol subjects (`A`, `C`, `1D`, `2D5`, `EX`, `AWG`, `TRIG`) are turned
//! into a [`Subject`] at the protocol boundary. Everything past the dispatcher
//! works with the tagged [`ChannelKey`]; the packed integer form exists only
//! for logging and for peers that still speak it.
//!
//! Packed layout (`u32`):
//!
//! | bits   | meaning                           |
//! |--------|-----------------------------------|
//! | 0..8   | analog channel or pod index       |
//! | 8..16  | lane index (digital only)         |
//! | 22     | auxiliary trigger input           |
//! | 23     | digital flag                      |

use crate::hardware::LANES_PER_POD;
use std::fmt;

const INDEX_MASK: u32 = 0xff;
const LANE_SHIFT: u32 = 8;
/// Packed flag marking the auxiliary (external) trigger input.
pub const AUX_FLAG: u32 = 0x40_0000;
/// Packed flag marking a digital pod/lane address.
pub const DIGITAL_FLAG: u32 = 0x80_0000;

/// Canonical address of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    /// Analog input, zero-based (`A` is 0)
    Analog(usize),
    /// One lane of an MSO pod, both zero-based (`1D3` is pod 0, lane 3)
    Digital { pod: usize, lane: usize },
    /// External trigger input (`EX`)
    Auxiliary,
}

impl Default for ChannelKey {
    fn default() -> Self {
        ChannelKey::Analog(0)
    }
}

impl ChannelKey {
    /// Pack into the integer wire representation.
    pub fn to_wire(self) -> u32 {
        match self {
            ChannelKey::Analog(index) => index as u32 & INDEX_MASK,
            ChannelKey::Digital { pod, lane } => {
                DIGITAL_FLAG | ((lane as u32 & INDEX_MASK) << LANE_SHIFT) | (pod as u32 & INDEX_MASK)
            }
            ChannelKey::Auxiliary => AUX_FLAG,
        }
    }

    /// Unpack the integer wire representation.
    pub fn from_wire(packed: u32) -> Self {
        if packed & AUX_FLAG != 0 {
            ChannelKey::Auxiliary
        } else if packed & DIGITAL_FLAG != 0 {
            ChannelKey::Digital {
                pod: (packed & INDEX_MASK) as usize,
                lane: ((packed >> LANE_SHIFT) & INDEX_MASK) as usize,
            }
        } else {
            ChannelKey::Analog((packed & INDEX_MASK) as usize)
        }
    }

    /// True for digital pod lanes.
    pub fn is_digital(self) -> bool {
        matches!(self, ChannelKey::Digital { .. })
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChannelKey::Analog(index) => {
                let letter = char::from(b'A' + (index as u8 % 26));
                write!(f, "{letter}")
            }
            ChannelKey::Digital { pod, lane } => write!(f, "{}D{}", pod + 1, lane),
            ChannelKey::Auxiliary => f.write_str("EX"),
        }
    }
}

/// What a protocol subject refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Function generator (`AWG:...`)
    Generator,
    /// Trigger subsystem (`TRIG:...`)
    Trigger,
    /// An input channel
    Channel(ChannelKey),
}

/// Maps subject tokens onto addresses for a given instrument size.
#[derive(Debug, Clone, Copy)]
pub struct AddressResolver {
    analog_channels: usize,
}

impl AddressResolver {
    /// Resolver for an instrument with `analog_channels` inputs
    pub fn new(analog_channels: usize) -> Self {
        Self { analog_channels }
    }

    /// Resolve a full subject token. `AWG` is checked before anything else
    /// because generator commands reuse channel keywords.
    pub fn resolve(&self, token: &str) -> Option<Subject> {
        match token {
            "AWG" => Some(Subject::Generator),
            "TRIG" => Some(Subject::Trigger),
            _ => self.channel(token).map(Subject::Channel),
        }
    }

    /// Resolve a channel token (`A`, `2D7`, `EX`).
    pub fn channel(&self, token: &str) -> Option<ChannelKey> {
        if token == "EX" {
            return Some(ChannelKey::Auxiliary);
        }

        let bytes = token.as_bytes();
        let first = *bytes.first()?;
        match first {
            b'A'..=b'Z' => {
                let last = self.analog_channels.saturating_sub(1);
                Some(ChannelKey::Analog(usize::from(first - b'A').min(last)))
            }
            b'0'..=b'9' => {
                let pod = usize::from(first - b'0').saturating_sub(1).min(1);
                let lane = match bytes.get(2) {
                    Some(c @ b'0'..=b'9') => usize::from(c - b'0').min(LANES_PER_POD - 1),
                    _ => 0,
                };
                Some(ChannelKey::Digital { pod, lane })
            }
            _ => None,
        }
    }
}
