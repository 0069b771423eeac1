//! The 16 bit USB PD message header.
use core::convert::TryFrom;

use byteorder::{ByteOrder, LittleEndian};
use proc_bitfield::bitfield;

use crate::protocol_layer::message::ParseError;
use crate::{DataRole, PowerRole};

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    /// The message header, which precedes the data objects of every message.
    pub struct Header(pub u16): Debug, FromStorage, IntoStorage {
        /// Set for extended messages, which this protocol layer does not construct.
        pub extended: bool @ 15,
        /// Count of data objects after the header, zero for control messages.
        pub num_objects: u8 [get usize] @ 12..=14,
        /// The rolling message ID of the sender.
        pub message_id: u8 @ 9..=11,
        /// The sender's power role.
        pub port_power_role: bool [get PowerRole, set PowerRole] @ 8,
        /// The revision that the sender implements. `0b11` is reserved.
        pub spec_revision: u8 [try_get SpecificationRevision, set SpecificationRevision] @ 6..=7,
        /// The sender's data role.
        pub port_data_role: bool [get DataRole, set DataRole] @ 5,
        /// The raw message type. Its meaning depends on `num_objects` and `extended`.
        pub message_type_raw: u8 @ 0..=4,
    }
}

impl Header {
    /// Create a header template with the port's roles and revision.
    ///
    /// Message type, ID and object count are filled in per message.
    pub fn new_template(
        port_data_role: DataRole,
        port_power_role: PowerRole,
        spec_revision: SpecificationRevision,
    ) -> Self {
        Self(0)
            .with_port_data_role(port_data_role)
            .with_port_power_role(port_power_role)
            .with_spec_revision(spec_revision)
    }

    /// Create a control message header that follows a template.
    pub fn new_control(template: Self, message_type: ControlMessageType) -> Self {
        template
            .with_message_type_raw(message_type as u8)
            .with_num_objects(0)
            .with_extended(false)
    }

    /// Create a data message header that follows a template.
    ///
    /// The object count is set when data objects are attached to the message.
    pub fn new_data(template: Self, message_type: DataMessageType) -> Self {
        template.with_message_type_raw(message_type as u8).with_extended(false)
    }

    /// Parse a little-endian header, rejecting the reserved revision.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() != 2 {
            return Err(ParseError::InvalidLength {
                expected: 2,
                found: buf.len(),
            });
        }

        let header = Header(LittleEndian::read_u16(buf));
        header.spec_revision()?;
        Ok(header)
    }

    /// Write the header in little-endian order, returning its size.
    pub fn to_bytes(self, buf: &mut [u8]) -> usize {
        LittleEndian::write_u16(buf, self.0);
        2
    }

    /// Interpret the raw type, which depends on the object count.
    pub fn message_type(&self) -> MessageType {
        if self.extended() {
            MessageType::Extended(self.message_type_raw())
        } else if self.num_objects() == 0 {
            MessageType::Control(self.message_type_raw().into())
        } else {
            MessageType::Data(self.message_type_raw().into())
        }
    }
}

/// Revisions of the USB PD specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(non_camel_case_types)]
pub enum SpecificationRevision {
    /// Deprecated.
    R1_0,
    /// The oldest revision still in use.
    R2_0,
    /// Any 3.x revision.
    R3_X,
}

impl TryFrom<u8> for SpecificationRevision {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b00 => Ok(Self::R1_0),
            0b01 => Ok(Self::R2_0),
            0b10 => Ok(Self::R3_X),
            _ => Err(ParseError::UnsupportedSpecificationRevision(value)),
        }
    }
}

impl From<SpecificationRevision> for u8 {
    fn from(value: SpecificationRevision) -> Self {
        match value {
            SpecificationRevision::R1_0 => 0b00,
            SpecificationRevision::R2_0 => 0b01,
            SpecificationRevision::R3_X => 0b10,
        }
    }
}

/// A decoded message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// A message without data objects.
    Control(ControlMessageType),
    /// A message with one to seven data objects.
    Data(DataMessageType),
    /// An extended message with its raw type.
    Extended(u8),
}

/// Control message types, as numbered on the wire.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMessageType {
    GoodCRC = 0b0_0001,
    GotoMin = 0b0_0010,
    Accept = 0b0_0011,
    Reject = 0b0_0100,
    Ping = 0b0_0101,
    PsRdy = 0b0_0110,
    GetSourceCap = 0b0_0111,
    GetSinkCap = 0b0_1000,
    DrSwap = 0b0_1001,
    PrSwap = 0b0_1010,
    VconnSwap = 0b0_1011,
    Wait = 0b0_1100,
    SoftReset = 0b0_1101,
    DataReset = 0b0_1110,
    DataResetComplete = 0b0_1111,
    NotSupported = 0b1_0000,
    GetSourceCapExtended = 0b1_0001,
    GetStatus = 0b1_0010,
    FrSwap = 0b1_0011,
    GetPpsStatus = 0b1_0100,
    GetCountryCodes = 0b1_0101,
    GetSinkCapExtended = 0b1_0110,
    GetSourceInfo = 0b1_0111,
    GetRevision = 0b1_1000,
    Reserved,
}

impl From<u8> for ControlMessageType {
    fn from(value: u8) -> Self {
        use ControlMessageType::*;

        const TYPES: [ControlMessageType; 24] = [
            GoodCRC,
            GotoMin,
            Accept,
            Reject,
            Ping,
            PsRdy,
            GetSourceCap,
            GetSinkCap,
            DrSwap,
            PrSwap,
            VconnSwap,
            Wait,
            SoftReset,
            DataReset,
            DataResetComplete,
            NotSupported,
            GetSourceCapExtended,
            GetStatus,
            FrSwap,
            GetPpsStatus,
            GetCountryCodes,
            GetSinkCapExtended,
            GetSourceInfo,
            GetRevision,
        ];

        // Control message types are numbered consecutively, starting at one.
        match value {
            1..=24 => TYPES[usize::from(value) - 1],
            _ => Reserved,
        }
    }
}

/// Data message types, as numbered on the wire.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataMessageType {
    SourceCapabilities = 0b0_0001,
    Request = 0b0_0010,
    Bist = 0b0_0011,
    SinkCapabilities = 0b0_0100,
    BatteryStatus = 0b0_0101,
    Alert = 0b0_0110,
    GetCountryInfo = 0b0_0111,
    EnterUsb = 0b0_1000,
    EprRequest = 0b0_1001,
    EprMode = 0b0_1010,
    SourceInfo = 0b0_1011,
    Revision = 0b0_1100,
    VendorDefined = 0b0_1111,
    Reserved,
}

impl From<u8> for DataMessageType {
    fn from(value: u8) -> Self {
        match value {
            0b0_0001 => Self::SourceCapabilities,
            0b0_0010 => Self::Request,
            0b0_0011 => Self::Bist,
            0b0_0100 => Self::SinkCapabilities,
            0b0_0101 => Self::BatteryStatus,
            0b0_0110 => Self::Alert,
            0b0_0111 => Self::GetCountryInfo,
            0b0_1000 => Self::EnterUsb,
            0b0_1001 => Self::EprRequest,
            0b0_1010 => Self::EprMode,
            0b0_1011 => Self::SourceInfo,
            0b0_1100 => Self::Revision,
            0b0_1111 => Self::VendorDefined,
            _ => Self::Reserved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ControlMessageType, DataMessageType, Header, MessageType, SpecificationRevision};
    use crate::protocol_layer::message::ParseError;
    use crate::{DataRole, PowerRole};

    #[test]
    fn test_control_header_layout() {
        let template = Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R2_0);
        let header = Header::new_control(template, ControlMessageType::SoftReset).with_message_id(5);

        let mut buf = [0u8; 2];
        header.to_bytes(&mut buf);

        // Type 0b01101, revision 0b01, message ID 0b101, no objects.
        assert_eq!(u16::from_le_bytes(buf), 0b0_000_101_0_01_0_01101);
        assert_eq!(
            header.message_type(),
            MessageType::Control(ControlMessageType::SoftReset)
        );
    }

    #[test]
    fn test_message_type_depends_on_object_count() {
        let template = Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R3_X);
        let header = Header::new_data(template, DataMessageType::Request);

        // Without objects, the raw type 0b00010 is a GotoMin control message.
        assert_eq!(header.message_type(), MessageType::Control(ControlMessageType::GotoMin));
        assert_eq!(
            header.with_num_objects(1).message_type(),
            MessageType::Data(DataMessageType::Request)
        );
    }

    #[test]
    fn test_control_message_type_from_raw() {
        assert_eq!(ControlMessageType::from(0b0_0001), ControlMessageType::GoodCRC);
        assert_eq!(ControlMessageType::from(0b0_1101), ControlMessageType::SoftReset);
        assert_eq!(ControlMessageType::from(0b1_1000), ControlMessageType::GetRevision);
        assert_eq!(ControlMessageType::from(0), ControlMessageType::Reserved);
        assert_eq!(ControlMessageType::from(0b1_1111), ControlMessageType::Reserved);
    }

    #[test]
    fn test_reserved_revision_is_rejected() {
        assert_eq!(
            Header::from_bytes(&[0xC1, 0x00]),
            Err(ParseError::UnsupportedSpecificationRevision(0b11))
        );
        assert!(matches!(
            Header::from_bytes(&[0x41]),
            Err(ParseError::InvalidLength { expected: 2, found: 1 })
        ));
    }
}
