//! Wire envelope for everything nodes send each other.
//!
//! ## Format
//!
//! A [`Message`] is a one-byte type tag plus an opaque body, bincode-encoded
//! as a `(u8, Vec<u8>)` pair. The body is itself the bincode encoding of a
//! [`Transaction`] or a [`Block`].
//!
//! The tag travels as a raw byte rather than an enum so that an unknown tag
//! surfaces as [`MessageError::UnknownType`] instead of a generic decode
//! failure.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::transport::{NetAddr, Rpc};
use crate::storage::Block;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to decode message: {0}")]
    Decode(#[source] bincode::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] bincode::Error),

    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Tag identifying what a message body holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Transaction = 0x01,
    Block = 0x02,
}

impl TryFrom<u8> for MessageType {
    type Error = MessageError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x01 => Ok(Self::Transaction),
            0x02 => Ok(Self::Block),
            other => Err(MessageError::UnknownType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction => f.write_str("tx"),
            Self::Block => f.write_str("block"),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Tagged envelope around an encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageType,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(header: MessageType, data: Vec<u8>) -> Self {
        Self { header, data }
    }

    /// Envelope carrying `tx`.
    pub fn transaction(tx: &Transaction) -> Result<Self, MessageError> {
        let data = bincode::serialize(tx).map_err(MessageError::Encode)?;
        Ok(Self::new(MessageType::Transaction, data))
    }

    /// Envelope carrying `block`.
    pub fn block(block: &Block) -> Result<Self, MessageError> {
        let data = bincode::serialize(block).map_err(MessageError::Encode)?;
        Ok(Self::new(MessageType::Block, data))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(&(self.header as u8, &self.data)).map_err(MessageError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let (tag, data): (u8, Vec<u8>) =
            bincode::deserialize(bytes).map_err(MessageError::Decode)?;
        Ok(Self::new(MessageType::try_from(tag)?, data))
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Typed body of a decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageData {
    Transaction(Transaction),
    Block(Block),
}

/// A fully decoded message and the peer it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub from: NetAddr,
    pub data: MessageData,
}

/// Pluggable envelope decoder.
pub type RpcDecoder =
    Arc<dyn Fn(Rpc) -> Result<DecodedMessage, MessageError> + Send + Sync + 'static>;

/// Default decoder: envelope first, then the body according to its tag.
pub fn decode_rpc(rpc: Rpc) -> Result<DecodedMessage, MessageError> {
    let message = Message::from_bytes(&rpc.payload)?;
    let data = match message.header {
        MessageType::Transaction => MessageData::Transaction(
            bincode::deserialize(&message.data).map_err(MessageError::Decode)?,
        ),
        MessageType::Block => {
            MessageData::Block(bincode::deserialize(&message.data).map_err(MessageError::Decode)?)
        }
    };
    Ok(DecodedMessage {
        from: rpc.from,
        data,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::crypto::PrivateKey;
    use crate::storage::Header;

    fn rpc(payload: Vec<u8>) -> Rpc {
        Rpc {
            from: NetAddr::from("A"),
            payload: Bytes::from(payload),
        }
    }

    #[test]
    fn transaction_message_decodes() {
        let mut tx = Transaction::new(b"hello".to_vec());
        tx.sign(&PrivateKey::generate());

        let bytes = Message::transaction(&tx).unwrap().to_bytes().unwrap();
        let decoded = decode_rpc(rpc(bytes)).unwrap();

        assert_eq!(decoded.from, NetAddr::from("A"));
        let MessageData::Transaction(back) = decoded.data else {
            panic!("expected a transaction");
        };
        assert_eq!(back, tx);
        assert_eq!(back.hash(), tx.hash());
        assert!(back.verify().is_ok());
        assert_eq!(back.first_seen(), 0);
    }

    #[test]
    fn block_message_decodes() {
        let key = PrivateKey::generate();
        let mut block = Block::new_from_parent(&Header::genesis(), vec![]);
        block.sign(&key);

        let bytes = Message::block(&block).unwrap().to_bytes().unwrap();
        let decoded = decode_rpc(rpc(bytes)).unwrap();

        assert_eq!(decoded.data, MessageData::Block(block));
    }

    #[test]
    fn unknown_tag_is_reported() {
        let bytes = bincode::serialize(&(0x7fu8, vec![1u8, 2, 3])).unwrap();
        assert!(matches!(
            decode_rpc(rpc(bytes)),
            Err(MessageError::UnknownType(0x7f))
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            decode_rpc(rpc(vec![0x01])),
            Err(MessageError::Decode(_))
        ));

        let bad_body = Message::new(MessageType::Block, vec![0xff; 3]).to_bytes().unwrap();
        assert!(matches!(
            decode_rpc(rpc(bad_body)),
            Err(MessageError::Decode(_))
        ));
    }

    #[test]
    fn envelope_bytes_parse_back() {
        let message = Message::new(MessageType::Transaction, b"body".to_vec());
        let parsed = Message::from_bytes(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, message);
    }
}
