//! The rolling message ID counter of the protocol layer transmitter.

/// The `MessageIDCounter`.
///
/// A 3 bit counter that wraps around from 7 to 0. Its value is stamped into the header of every
/// transmitted message, and must be echoed by the port partner's GoodCRC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageIdCounter {
    value: u8,
}

impl MessageIdCounter {
    /// The largest message ID, after which the counter wraps.
    pub const MAX_VALUE: u8 = 7;

    /// Create a counter that starts at zero.
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Create a counter from a given value, truncated to the counter's range.
    pub const fn new_from_value(value: u8) -> Self {
        Self {
            value: value % (Self::MAX_VALUE + 1),
        }
    }

    /// The current message ID.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Advance to the next message ID.
    pub fn increment(&mut self) {
        *self = Self::new_from_value(self.value + 1);
    }

    /// Start over at zero.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}
