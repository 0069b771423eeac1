//! The protocol layer transmitter state machine.
//!
//! The PHY retries transmissions in hardware, until it receives a GoodCRC or gives up.
//! Therefore, the transmitter keeps no retry counter and runs no `CRCReceiveTimer`. It only
//! reacts to the final outcome that the PHY reports for every frame.
use byteorder::{ByteOrder, LittleEndian};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use usbpd_prl_traits::Phy;

use super::message::header::{ControlMessageType, Header, MessageType};
use super::message::{MAX_MESSAGE_SIZE, Message};
use super::{PolicyEngineEvents, ProtocolRxEvents, TxChannel, TxEvents};
use crate::counters::MessageIdCounter;
use crate::events::Events;


/// Transmitter states.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Default state at startup.
    PhyReset,
    WaitMessage,
    /// Entered before sending a soft reset.
    Reset,
    ConstructMessage,
    WaitResponse,
    MatchMessageId,
    TransmissionError,
    MessageSent,
    DiscardMessage,
}

/// Whether a received header acknowledges the message with ID `message_id`.
fn acknowledges(header: Header, message_id: u8) -> bool {
    header.message_type_raw() == ControlMessageType::GoodCRC as u8
        && header.num_objects() == 0
        && header.message_id() == message_id
}

/// The transmitting half of the protocol layer.
///
/// Runs as its own task, see [`ProtocolTx::run()`]. The message ID counter and the message in
/// flight are only ever touched by this task.
pub struct ProtocolTx<'a, M: RawMutex, PHY: Phy> {
    phy: PHY,
    channel: &'a TxChannel<M>,
    policy_engine: &'a Events<M, PolicyEngineEvents>,
    protocol_rx: &'a Events<M, ProtocolRxEvents>,
    message_id: MessageIdCounter,
    message: Option<Message>,
    state: State,
}

impl<'a, M: RawMutex, PHY: Phy> ProtocolTx<'a, M, PHY> {
    /// Create a new transmitter.
    ///
    /// - `channel` carries requests and directives in, and PHY outcomes.
    /// - `policy_engine` receives the outcome of every transmission.
    /// - `protocol_rx` is signaled when the receiver must forget its last message ID.
    pub fn new(
        phy: PHY,
        channel: &'a TxChannel<M>,
        policy_engine: &'a Events<M, PolicyEngineEvents>,
        protocol_rx: &'a Events<M, ProtocolRxEvents>,
    ) -> Self {
        Self {
            phy,
            channel,
            policy_engine,
            protocol_rx,
            message_id: MessageIdCounter::new(),
            message: None,
            state: State::PhyReset,
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The message ID that the next transmission will use.
    pub fn message_id(&self) -> u8 {
        self.message_id.value()
    }

    /// Run the transmitter's state machine continuously.
    pub async fn run(&mut self) {
        loop {
            self.run_step().await;
        }
    }

    /// Run a single step in the state machine.
    ///
    /// Only blocks in `WaitMessage` and `WaitResponse`, until one of their events is signaled.
    pub async fn run_step(&mut self) {
        let new_state = match self.state {
            State::PhyReset => self.phy_reset().await,
            State::WaitMessage => self.wait_message().await,
            State::Reset => self.reset().await,
            State::ConstructMessage => self.construct_message().await,
            State::WaitResponse => self.wait_response().await,
            State::MatchMessageId => self.match_message_id().await,
            State::TransmissionError => self.transmission_error(),
            State::MessageSent => self.message_sent(),
            State::DiscardMessage => self.discard_message(),
        };

        trace!("Protocol TX {:?} -> {:?}", self.state, new_state);
        self.state = new_state;
    }

    /// Drop requests that were queued before a reset directive, and fail them.
    fn drop_queued_requests(&self) {
        let mut dropped = false;

        while let Ok(message) = self.channel.requests.try_receive() {
            warn!("Dropping request that was queued before reset: {:?}", message);
            dropped = true;
        }
        self.channel.events.take(TxEvents::MESSAGE_TX);

        if dropped {
            self.policy_engine.signal(PolicyEngineEvents::TX_ERR);
        }
    }

    async fn phy_reset(&mut self) -> State {
        self.phy.reset().await;

        // Outcomes of an earlier frame are void once the PHY was reset.
        self.channel.events.take(TxEvents::TX_SENT | TxEvents::RETRY_FAIL);

        if self.message.take().is_some() {
            self.policy_engine.signal(PolicyEngineEvents::TX_ERR);
        }

        State::WaitMessage
    }

    async fn wait_message(&mut self) -> State {
        // A discard may have won over a request, which is still queued.
        if !self.channel.requests.is_empty() {
            debug!("{} requests still queued", self.channel.requests.len());
            self.channel.events.signal(TxEvents::MESSAGE_TX);
        }

        let events = self
            .channel
            .events
            .wait_any(TxEvents::RESET | TxEvents::DISCARD | TxEvents::MESSAGE_TX)
            .await;

        if events.reset() {
            self.drop_queued_requests();
            return State::PhyReset;
        }
        if events.discard() {
            return State::DiscardMessage;
        }

        let Ok(message) = self.channel.requests.try_receive() else {
            warn!("Transmission request signaled, but none is queued");
            return State::WaitMessage;
        };

        // A soft reset restarts message IDs on both sides, before it is sent with ID zero.
        let new_state = if message.header().message_type() == MessageType::Control(ControlMessageType::SoftReset) {
            State::Reset
        } else {
            State::ConstructMessage
        };

        self.message = Some(message);
        new_state
    }

    async fn reset(&mut self) -> State {
        self.message_id.reset();
        self.protocol_rx.signal(ProtocolRxEvents::RESET);

        // Let the receiver observe its reset, before anything is sent.
        yield_now().await;

        State::ConstructMessage
    }

    async fn construct_message(&mut self) -> State {
        let events = self.channel.events.take(TxEvents::RESET | TxEvents::DISCARD);

        if events.reset() {
            self.drop_queued_requests();
            return State::PhyReset;
        }
        if events.discard() {
            return State::DiscardMessage;
        }

        let Some(message) = self.message.as_mut() else {
            error!("No message to construct");
            return State::WaitMessage;
        };

        message.set_message_id(self.message_id.value());

        let mut buffer = [0u8; MAX_MESSAGE_SIZE];
        let size = message.to_bytes(&mut buffer);

        match self.phy.send_message(&buffer[..size]).await {
            Ok(()) => State::WaitResponse,
            Err(err) => {
                error!("PHY refused message: {:?}", err);
                State::TransmissionError
            }
        }
    }

    async fn wait_response(&mut self) -> State {
        let events = self
            .channel
            .events
            .wait_any(TxEvents::RESET | TxEvents::DISCARD | TxEvents::TX_SENT | TxEvents::RETRY_FAIL)
            .await;

        if events.reset() {
            self.drop_queued_requests();
            State::PhyReset
        } else if events.discard() {
            State::DiscardMessage
        } else if events.tx_sent() {
            State::MatchMessageId
        } else {
            State::TransmissionError
        }
    }

    async fn match_message_id(&mut self) -> State {
        let mut buffer = [0u8; MAX_MESSAGE_SIZE];

        let header = match self.phy.read_message(&mut buffer).await {
            Ok(length) if length >= 2 => Header::from(LittleEndian::read_u16(&buffer[..2])),
            Ok(length) => {
                warn!("Frame of {} bytes is no GoodCRC", length);
                return State::TransmissionError;
            }
            Err(err) => {
                warn!("Failed to read GoodCRC: {:?}", err);
                return State::TransmissionError;
            }
        };

        if acknowledges(header, self.message_id.value()) {
            State::MessageSent
        } else {
            warn!(
                "Unexpected acknowledgement {:?} for message ID {}",
                header,
                self.message_id.value()
            );
            State::TransmissionError
        }
    }

    fn transmission_error(&mut self) -> State {
        self.message_id.increment();
        self.policy_engine.signal(PolicyEngineEvents::TX_ERR);
        self.message = None;

        State::WaitMessage
    }

    fn message_sent(&mut self) -> State {
        self.message_id.increment();
        self.policy_engine.signal(PolicyEngineEvents::TX_DONE);
        self.message = None;

        State::WaitMessage
    }

    fn discard_message(&mut self) -> State {
        // The message ID of a discarded message is consumed, but its outcome is not reported.
        if self.message.take().is_some() {
            self.message_id.increment();
        }

        State::PhyReset
    }
}
