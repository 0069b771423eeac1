//! USB PD protocol layer message transmission for `[no_std]`.
//!
//! Implements the transmitting half of the USB PD protocol layer as an independent task,
//! which exchanges signals with the policy engine, the protocol layer receiver and the PHY.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

// This must go first, so that the other modules see its macros.
mod fmt;

pub mod counters;
pub mod events;
pub mod protocol_layer;

#[cfg(test)]
mod dummy;

/// The port's power role, as encoded in the message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerRole {
    /// The port provides power.
    Source,
    /// The port consumes power.
    Sink,
}

impl From<bool> for PowerRole {
    fn from(value: bool) -> Self {
        if value { Self::Source } else { Self::Sink }
    }
}

impl From<PowerRole> for bool {
    fn from(role: PowerRole) -> bool {
        matches!(role, PowerRole::Source)
    }
}

/// The port's data role, as encoded in the message header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataRole {
    /// Upstream facing port.
    Ufp,
    /// Downstream facing port.
    Dfp,
}

impl From<bool> for DataRole {
    fn from(value: bool) -> Self {
        if value { Self::Dfp } else { Self::Ufp }
    }
}

impl From<DataRole> for bool {
    fn from(role: DataRole) -> bool {
        matches!(role, DataRole::Dfp)
    }
}
