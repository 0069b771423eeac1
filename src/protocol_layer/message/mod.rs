//! Definitions of message content.
pub mod header;

use byteorder::{ByteOrder, LittleEndian};
use header::{ControlMessageType, DataMessageType, Header};

/// The maximum number of data objects in a (non-extended) message.
pub const MAX_DATA_OBJECTS: usize = 7;

/// The maximum size of a (non-extended) message, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 2 + 4 * MAX_DATA_OBJECTS;

/// Errors that can occur during message/header parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// The input buffer has an invalid length.
    /// * `expected` - The expected length.
    /// * `found` - The actual length found.
    #[error("invalid input buffer length (expected {expected:?}, found {found:?})")]
    InvalidLength {
        /// The expected length.
        expected: usize,
        /// The actual length found.
        found: usize,
    },
    /// More data objects than fit into a message.
    #[error("too many data objects ({0}, at most 7)")]
    TooManyDataObjects(usize),
    /// The specification revision field is not supported.
    #[error("unsupported specification revision `{0}`")]
    UnsupportedSpecificationRevision(u8),
}

/// A USB PD message.
///
/// The object count in the header always matches the attached data objects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "MessageParts"))]
pub struct Message {
    header: Header,
    data_objects: heapless::Vec<u32, MAX_DATA_OBJECTS>,
}

/// Deserialized message fields, before the object count is taken from the data objects.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct MessageParts {
    header: Header,
    data_objects: heapless::Vec<u32, MAX_DATA_OBJECTS>,
}

#[cfg(feature = "serde")]
impl TryFrom<MessageParts> for Message {
    type Error = ParseError;

    fn try_from(parts: MessageParts) -> Result<Self, Self::Error> {
        Self::new_with_data_objects(parts.header, &parts.data_objects)
    }
}

impl Message {
    /// Create a message without data objects from a header.
    pub fn new(header: Header) -> Self {
        Self {
            header: header.with_num_objects(0),
            data_objects: heapless::Vec::new(),
        }
    }

    /// Create a message from a header and its data objects.
    pub fn new_with_data_objects(header: Header, data_objects: &[u32]) -> Result<Self, ParseError> {
        let data_objects =
            heapless::Vec::from_slice(data_objects).map_err(|_| ParseError::TooManyDataObjects(data_objects.len()))?;

        Ok(Self {
            // Cannot truncate, the count is at most seven.
            header: header.with_num_objects(data_objects.len() as u8),
            data_objects,
        })
    }

    /// Create a control message.
    pub fn new_control(template: Header, message_type: ControlMessageType) -> Self {
        Self::new(Header::new_control(template, message_type))
    }

    /// Create a data message.
    pub fn new_data(
        template: Header,
        message_type: DataMessageType,
        data_objects: &[u32],
    ) -> Result<Self, ParseError> {
        Self::new_with_data_objects(Header::new_data(template, message_type), data_objects)
    }

    /// The message header.
    pub fn header(&self) -> Header {
        self.header
    }

    /// The data objects that follow the header.
    pub fn data_objects(&self) -> &[u32] {
        &self.data_objects
    }

    /// Stamp a message ID into the header.
    pub fn set_message_id(&mut self, message_id: u8) {
        self.header.set_message_id(message_id);
    }

    /// The size of the serialized message in bytes.
    pub fn size(&self) -> usize {
        2 + 4 * self.data_objects.len()
    }

    /// Serialize a message to a slice, returning the number of written bytes.
    ///
    /// The buffer must hold at least [`Message::size()`] bytes, [`MAX_MESSAGE_SIZE`] always suffices.
    pub fn to_bytes(&self, buffer: &mut [u8]) -> usize {
        let mut size = self.header.to_bytes(buffer);

        for data_object in &self.data_objects {
            LittleEndian::write_u32(&mut buffer[size..size + 4], *data_object);
            size += 4;
        }

        size
    }

    /// Parse a message from a slice of bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < 2 {
            return Err(ParseError::InvalidLength {
                expected: 2,
                found: data.len(),
            });
        }

        let header = Header::from_bytes(&data[..2])?;
        let expected = 2 + 4 * header.num_objects();

        if data.len() != expected {
            return Err(ParseError::InvalidLength {
                expected,
                found: data.len(),
            });
        }

        let mut data_objects = heapless::Vec::new();
        for chunk in data[2..].chunks_exact(4) {
            // At most seven objects fit into the three bit object count.
            _ = data_objects.push(LittleEndian::read_u32(chunk));
        }

        Ok(Self { header, data_objects })
    }
}

#[cfg(test)]
mod tests {
    use super::header::{ControlMessageType, DataMessageType, Header, SpecificationRevision};
    use super::{MAX_MESSAGE_SIZE, Message, ParseError};
    use crate::{DataRole, PowerRole};

    fn template() -> Header {
        Header::new_template(DataRole::Ufp, PowerRole::Sink, SpecificationRevision::R3_X)
    }

    #[test]
    fn test_object_count_follows_data_objects() {
        // A template that claims objects must not leak into a control message.
        let message = Message::new_control(template().with_num_objects(3), ControlMessageType::Accept);
        assert_eq!(message.header().num_objects(), 0);

        let message = Message::new_data(template(), DataMessageType::Request, &[0x1304_B12C]).unwrap();
        assert_eq!(message.header().num_objects(), 1);
        assert_eq!(message.size(), 6);
    }

    #[test]
    fn test_too_many_data_objects() {
        assert_eq!(
            Message::new_data(template(), DataMessageType::SinkCapabilities, &[0; 8]),
            Err(ParseError::TooManyDataObjects(8))
        );
    }

    #[test]
    fn test_data_objects_are_little_endian() {
        let message = Message::new_data(template(), DataMessageType::Request, &[0x1304_B12C]).unwrap();

        let mut buffer = [0u8; MAX_MESSAGE_SIZE];
        let size = message.to_bytes(&mut buffer);

        assert_eq!(size, 6);
        assert_eq!(&buffer[2..6], &[0x2C, 0xB1, 0x04, 0x13]);
        assert_eq!(Message::from_bytes(&buffer[..size]).unwrap(), message);
    }

    #[test]
    fn test_full_size_message() {
        let data_objects = [0xDEAD_BEEF; 7];
        let message = Message::new_data(template(), DataMessageType::SourceCapabilities, &data_objects).unwrap();

        let mut buffer = [0u8; MAX_MESSAGE_SIZE];
        assert_eq!(message.to_bytes(&mut buffer), 30);
        assert_eq!(Message::from_bytes(&buffer).unwrap().data_objects(), &data_objects);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialized_object_count_follows_data_objects() {
        // The header claims one data object, but none follow.
        let message: Message = serde_json::from_str(r#"{"header":4096,"data_objects":[]}"#).unwrap();
        assert_eq!(message.header().num_objects(), 0);
        assert_eq!(message.size(), 2);

        let message: Message = serde_json::from_str(r#"{"header":0,"data_objects":[1,2]}"#).unwrap();
        assert_eq!(message.header().num_objects(), 2);
        assert_eq!(message.data_objects(), &[1, 2]);

        let request = Message::new_data(template(), DataMessageType::Request, &[0x1304_B12C]).unwrap();
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(serde_json::from_str::<Message>(&json).unwrap(), request);
    }

    #[test]
    fn test_length_must_match_object_count() {
        let message = Message::new_data(template(), DataMessageType::Request, &[1]).unwrap();

        let mut buffer = [0u8; MAX_MESSAGE_SIZE];
        message.to_bytes(&mut buffer);

        assert_eq!(
            Message::from_bytes(&buffer[..4]),
            Err(ParseError::InvalidLength { expected: 6, found: 4 })
        );
        assert!(matches!(
            Message::from_bytes(&buffer[..1]),
            Err(ParseError::InvalidLength { expected: 2, found: 1 })
        ));
    }
}
