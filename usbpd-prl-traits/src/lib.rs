//! USB PD protocol layer PHY traits.
//!
//! Provides the PHY trait that the protocol layer transmits through, so that
//! transceivers with hardware retry (e.g. FUSB302B) can be plugged in.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
use core::future::Future;

/// Error when handing a frame to the PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyTxError {
    /// The transceiver did not accept the frame, e.g. its TX FIFO was busy.
    Discarded,

    /// Hard Reset received before the frame was accepted.
    HardReset,
}

/// Error when reading back a frame from the PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyRxError {
    /// No frame available, or it was dropped due to CRC errors.
    Discarded,

    /// Hard Reset received before or during reception.
    HardReset,
}

/// PHY trait, through which the protocol layer transmitter talks to the transceiver.
///
/// The PHY retries transmissions on its own until it receives a GoodCRC or its retry
/// budget is exhausted. The outcome of every accepted frame is reported out of band,
/// through exactly one of `TxChannel::transmission_succeeded()` or
/// `TxChannel::retries_exhausted()` in the protocol layer, typically from the
/// transceiver's interrupt handler.
pub trait Phy {
    /// Reset the transceiver, flushing its FIFOs and any transmission in progress.
    fn reset(&mut self) -> impl Future<Output = ()>;

    /// Start transmission of a frame.
    ///
    /// Returns as soon as the frame is queued in the transceiver, not when it was sent.
    fn send_message(&mut self, frame: &[u8]) -> impl Future<Output = Result<(), PhyTxError>>;

    /// Read the last received frame (the GoodCRC after a transmission) into `buffer`.
    ///
    /// Returns the frame length.
    fn read_message(&mut self, buffer: &mut [u8]) -> impl Future<Output = Result<usize, PhyRxError>>;
}
