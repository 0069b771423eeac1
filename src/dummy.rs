//! Implements a dummy PHY for testing.
use std::vec::Vec;

use usbpd_prl_traits::{Phy, PhyRxError, PhyTxError};

use crate::protocol_layer::message::MAX_MESSAGE_SIZE;

/// A dummy PHY that records transmitted frames, and plays back injected ones.
pub struct DummyPhy {
    resets: usize,
    refuse_transmissions: bool,
    rx_vec: Vec<heapless::Vec<u8, MAX_MESSAGE_SIZE>>,
    tx_vec: Vec<heapless::Vec<u8, MAX_MESSAGE_SIZE>>,
}

impl DummyPhy {
    /// Create a new dummy PHY.
    pub fn new() -> Self {
        Self {
            resets: 0,
            refuse_transmissions: false,
            rx_vec: Vec::new(),
            tx_vec: Vec::new(),
        }
    }

    /// Inject received data that can be read back later.
    ///
    /// Survives PHY resets, so that frames can be injected before the transmitter starts.
    pub fn inject_received_data(&mut self, data: &[u8]) {
        let mut vec = heapless::Vec::new();
        vec.extend_from_slice(data).unwrap();

        self.rx_vec.push(vec);
    }

    /// Probe the oldest frame that was transmitted.
    pub fn probe_transmitted_data(&mut self) -> heapless::Vec<u8, MAX_MESSAGE_SIZE> {
        self.tx_vec.remove(0)
    }

    /// The number of transmitted frames that were not probed yet.
    pub fn transmitted_count(&self) -> usize {
        self.tx_vec.len()
    }

    /// The number of PHY resets.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Refuse all further frames, as if the transmitter FIFO was stuck.
    pub fn refuse_transmissions(&mut self) {
        self.refuse_transmissions = true;
    }
}

impl Phy for DummyPhy {
    async fn reset(&mut self) {
        self.resets += 1;
    }

    async fn send_message(&mut self, frame: &[u8]) -> Result<(), PhyTxError> {
        if self.refuse_transmissions {
            return Err(PhyTxError::Discarded);
        }

        let mut vec = heapless::Vec::new();
        vec.extend_from_slice(frame).unwrap();
        self.tx_vec.push(vec);

        Ok(())
    }

    async fn read_message(&mut self, buffer: &mut [u8]) -> Result<usize, PhyRxError> {
        if self.rx_vec.is_empty() {
            return Err(PhyRxError::Discarded);
        }

        let first = self.rx_vec.remove(0);
        let len = first.len();
        buffer[..len].copy_from_slice(&first);

        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use usbpd_prl_traits::{Phy, PhyRxError};

    use crate::dummy::DummyPhy;

    #[tokio::test]
    async fn test_read_back_in_order() {
        let mut phy = DummyPhy::new();

        phy.inject_received_data(&[0x41, 0x02]);
        phy.inject_received_data(&[0x41, 0x04]);

        let mut buf = [0u8; 30];
        assert_eq!(phy.read_message(&mut buf).await, Ok(2));
        assert_eq!(&buf[..2], &[0x41, 0x02]);

        assert_eq!(phy.read_message(&mut buf).await, Ok(2));
        assert_eq!(&buf[..2], &[0x41, 0x04]);

        assert_eq!(phy.read_message(&mut buf).await, Err(PhyRxError::Discarded));
    }
}
