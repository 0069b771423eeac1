//! The protocol layer is controlled by the policy engine, and commands the PHY layer.
//!
//! This crate implements its transmitting half, [`tx::ProtocolTx`], which
//! - stamps message IDs into outgoing messages,
//! - hands messages to the PHY, which retries on its own,
//! - matches the GoodCRC that the PHY received against the message ID counter,
//! - reports the outcome of every transmission to the policy engine,
//! - resets the receiving half of the protocol layer before sending a soft reset.
//!
//! All coordination happens through latching [`Events`] and a request queue, bundled in a [`TxChannel`].

pub mod message;
pub mod tx;

use core::ops::BitOr;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use message::Message;
use proc_bitfield::bitfield;

use crate::events::Events;

/// The number of transmission requests that can be queued.
pub const TX_QUEUE_DEPTH: usize = 4;

/// Errors that the policy engine sees when transmitting.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// The request queue is full.
    #[error("transmission request queue is full")]
    QueueFull,
    /// The message was not acknowledged, either because the PHY exhausted its retries,
    /// or because the GoodCRC did not match.
    #[error("message transmission failed")]
    TransmissionFailed,
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Events that the transmitter waits for.
    pub struct TxEvents(pub u8): Debug, FromStorage, IntoStorage {
        /// Reset the transmitter (and PHY), failing a message in flight.
        pub reset: bool @ 0,
        /// Discard the message in flight, without reporting its outcome.
        pub discard: bool @ 1,
        /// A transmission request is queued.
        pub message_tx: bool @ 2,
        /// The PHY received a GoodCRC for the transmitted frame.
        pub tx_sent: bool @ 3,
        /// The PHY gave up after exhausting its retries.
        pub retry_fail: bool @ 4,
    }
}

impl TxEvents {
    /// See [`TxEvents::reset()`].
    pub const RESET: Self = Self(1 << 0);
    /// See [`TxEvents::discard()`].
    pub const DISCARD: Self = Self(1 << 1);
    /// See [`TxEvents::message_tx()`].
    pub const MESSAGE_TX: Self = Self(1 << 2);
    /// See [`TxEvents::tx_sent()`].
    pub const TX_SENT: Self = Self(1 << 3);
    /// See [`TxEvents::retry_fail()`].
    pub const RETRY_FAIL: Self = Self(1 << 4);
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Events that the transmitter signals to the policy engine.
    pub struct PolicyEngineEvents(pub u8): Debug, FromStorage, IntoStorage {
        /// The message was acknowledged by the port partner.
        pub tx_done: bool @ 0,
        /// The message could not be transmitted.
        pub tx_err: bool @ 1,
    }
}

impl PolicyEngineEvents {
    /// See [`PolicyEngineEvents::tx_done()`].
    pub const TX_DONE: Self = Self(1 << 0);
    /// See [`PolicyEngineEvents::tx_err()`].
    pub const TX_ERR: Self = Self(1 << 1);
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    /// Events that the transmitter signals to the receiving half of the protocol layer.
    pub struct ProtocolRxEvents(pub u8): Debug, FromStorage, IntoStorage {
        /// Forget the last received message ID, a soft reset is about to be sent.
        pub reset: bool @ 0,
    }
}

impl ProtocolRxEvents {
    /// See [`ProtocolRxEvents::reset()`].
    pub const RESET: Self = Self(1 << 0);
}

macro_rules! impl_bit_or {
    ($($events:ty),*) => {
        $(
            impl BitOr for $events {
                type Output = Self;

                fn bitor(self, rhs: Self) -> Self {
                    Self(self.0 | rhs.0)
                }
            }
        )*
    };
}

impl_bit_or!(TxEvents, PolicyEngineEvents, ProtocolRxEvents);

/// The inbound side of the transmitter: its request queue and the events it waits for.
///
/// The policy engine queues requests and issues reset/discard directives, the PHY reports
/// transmission outcomes. Usually placed in a `static`, so that all parties can share it.
pub struct TxChannel<M: RawMutex> {
    events: Events<M, TxEvents>,
    requests: Channel<M, Message, TX_QUEUE_DEPTH>,
}

impl<M: RawMutex> TxChannel<M> {
    /// Create an empty channel.
    pub const fn new() -> Self {
        Self {
            events: Events::new(),
            requests: Channel::new(),
        }
    }

    /// Queue a message for transmission.
    ///
    /// The message ID is assigned by the transmitter. Exactly one of
    /// [`PolicyEngineEvents::TX_DONE`] or [`PolicyEngineEvents::TX_ERR`] is signaled once the
    /// transmission completed. Only one message should be in flight at a time.
    pub fn submit(&self, message: Message) -> Result<(), TxError> {
        self.requests.try_send(message).map_err(|_| TxError::QueueFull)?;
        self.events.signal(TxEvents::MESSAGE_TX);
        Ok(())
    }

    /// Queue a message and wait for the outcome of its transmission.
    pub async fn transmit<N: RawMutex>(
        &self,
        message: Message,
        policy_engine: &Events<N, PolicyEngineEvents>,
    ) -> Result<(), TxError> {
        self.submit(message)?;
        wait_for_outcome(policy_engine).await
    }

    /// Reset the transmitter.
    ///
    /// A message in flight fails. Requests that are still queued are dropped.
    /// The transmitter must observe the reset before new requests are submitted.
    pub fn reset(&self) {
        self.events.signal(TxEvents::RESET);
    }

    /// Discard the message in flight, if any.
    ///
    /// Its message ID is consumed, but no outcome is reported.
    pub fn discard(&self) {
        self.events.signal(TxEvents::DISCARD);
    }

    /// Report from the PHY that the transmitted frame was acknowledged.
    pub fn transmission_succeeded(&self) {
        self.events.signal(TxEvents::TX_SENT);
    }

    /// Report from the PHY that it gave up on the transmitted frame.
    pub fn retries_exhausted(&self) {
        self.events.signal(TxEvents::RETRY_FAIL);
    }
}

impl<M: RawMutex> Default for TxChannel<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the outcome of a submitted transmission, on the policy engine's side.
///
/// If both outcomes are pending, success wins and both are cleared. The failure then belongs
/// to a request that was dropped by a reset.
pub async fn wait_for_outcome<M: RawMutex>(policy_engine: &Events<M, PolicyEngineEvents>) -> Result<(), TxError> {
    let events = policy_engine
        .wait_any(PolicyEngineEvents::TX_DONE | PolicyEngineEvents::TX_ERR)
        .await;

    if events.tx_done() {
        Ok(())
    } else {
        Err(TxError::TransmissionFailed)
    }
}
