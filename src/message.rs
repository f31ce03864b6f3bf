//! Logical command and response messages.
//!
//! [`CommandMessage`] is what a test builds and hands to the fragmenter;
//! [`ResponseMessage`] is what the reassembler produces once every fragment
//! of a transaction has arrived. Test code never constructs a response
//! directly, which keeps "complete response" meaning exactly one thing:
//! the reassembler said so.

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{MbimError, Result};

/// CommandType field of MBIM_COMMAND_MSG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// Query the current value of a CID.
    Query,
    /// Set a new value for a CID.
    Set,
}

impl CommandType {
    /// Wire value of this command type.
    #[inline]
    pub fn to_wire(self) -> u32 {
        match self {
            CommandType::Query => 0,
            CommandType::Set => 1,
        }
    }

    /// Decode a wire value, `None` if undefined.
    pub fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(CommandType::Query),
            1 => Some(CommandType::Set),
            _ => None,
        }
    }
}

/// Process-local source of transaction identifiers.
///
/// Ids start at 1 (0 is never a valid host id), strictly increase, and are
/// never reissued within a session. A session that consumes the whole u32
/// space gets [`MbimError::TransactionIdExhausted`] instead of a wrapped,
/// potentially aliasing id.
#[derive(Debug)]
pub struct TransactionIdGenerator {
    next: u32,
}

impl TransactionIdGenerator {
    /// Create a generator for a fresh channel session.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Create a generator whose next id is `next`.
    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next }
    }

    /// Issue the next transaction id.
    pub fn next_id(&mut self) -> Result<u32> {
        if self.next == 0 {
            return Err(MbimError::TransactionIdExhausted);
        }
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        Ok(id)
    }
}

impl Default for TransactionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A logical MBIM command, immutable once constructed.
#[derive(Debug, Clone)]
pub struct CommandMessage {
    /// Transaction id assigned at construction.
    pub transaction_id: u32,
    /// Device service the command is scoped to.
    pub service_id: Uuid,
    /// Command identifier within the service.
    pub cid: u32,
    /// Query or Set.
    pub command_type: CommandType,
    /// InformationBuffer payload; may be empty.
    pub payload: Bytes,
}

impl CommandMessage {
    /// Build a command, drawing its transaction id from the generator.
    pub fn new(
        ids: &mut TransactionIdGenerator,
        service_id: Uuid,
        command_id: u32,
        command_type: CommandType,
        payload: Bytes,
    ) -> Result<Self> {
        Ok(Self {
            transaction_id: ids.next_id()?,
            service_id,
            cid: command_id,
            command_type,
            payload,
        })
    }
}

/// A reassembled MBIM command response.
///
/// Produced only by the reassembler; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    transaction_id: u32,
    service_id: Uuid,
    cid: u32,
    status: u32,
    payload: Bytes,
}

impl ResponseMessage {
    pub(crate) fn new(
        transaction_id: u32,
        service_id: Uuid,
        cid: u32,
        status: u32,
        payload: Bytes,
    ) -> Self {
        Self {
            transaction_id,
            service_id,
            cid,
            status,
            payload,
        }
    }

    /// Transaction id the response correlates to.
    #[inline]
    pub fn transaction_id(&self) -> u32 {
        self.transaction_id
    }

    /// Device service the response belongs to.
    #[inline]
    pub fn service_id(&self) -> Uuid {
        self.service_id
    }

    /// Command identifier within the service.
    #[inline]
    pub fn cid(&self) -> u32 {
        self.cid
    }

    /// Status code reported by the function.
    #[inline]
    pub fn status(&self) -> u32 {
        self.status
    }

    /// Reassembled InformationBuffer.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
