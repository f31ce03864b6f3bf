//! Error types for mbim-compliance.

use thiserror::Error;

/// Main error type for all engine operations.
#[derive(Debug, Error)]
pub enum MbimError {
    /// I/O error at the transport boundary.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening the control channel failed (bad descriptor, claim rejected).
    #[error("channel open failed: {0}")]
    ChannelOpen(String),

    /// The channel was closed or the device disconnected mid-session.
    #[error("channel closed")]
    ChannelClosed,

    /// The function rejected MBIM_OPEN with a non-success status.
    #[error("MBIM_OPEN rejected with status {status:#010x}")]
    OpenRejected {
        /// Status code carried in MBIM_OPEN_DONE.
        status: u32,
    },

    /// A fragment set could not be reassembled into a response.
    #[error("reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// The per-session transaction id space has been consumed.
    ///
    /// Wrapping would alias a still-outstanding transaction, so this is
    /// fatal rather than silently reused.
    #[error("transaction id space exhausted")]
    TransactionIdExhausted,

    /// A bounded poll elapsed with transactions still unresolved.
    #[error("poll timed out with {} unresolved transaction(s)", .unresolved.len())]
    PollTimeout {
        /// Transaction ids that never resolved within the bound.
        unresolved: Vec<u32>,
    },

    /// A compliance assertion failed; this is the test verdict.
    ///
    /// The clause identifier cites the exact specification passage violated,
    /// e.g. `mbim1.0:8.1.2#2`.
    #[error("compliance failure [{clause}]: {detail}")]
    Compliance {
        /// Specification clause identifier, carried verbatim from the caller.
        clause: String,
        /// Human-readable description of the observed divergence.
        detail: String,
    },

    /// No check is registered for the requested clause identifier.
    #[error("no compliance check registered for clause {0}")]
    UnknownClause(String),

    /// Protocol violation not covered by a more specific variant.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors raised while reassembling response fragments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The transfer is shorter than its mandatory headers.
    #[error("truncated transfer: need {needed} bytes, got {got}")]
    Truncated {
        /// Bytes required by the headers for this message type.
        needed: usize,
        /// Bytes actually present.
        got: usize,
    },

    /// MessageType is not one defined by MBIM 1.0.
    #[error("unknown message type {0:#010x}")]
    UnknownMessageType(u32),

    /// The fragment set carries a message type that is not a command response.
    #[error("unexpected message type {0:#010x} in response fragment set")]
    UnexpectedMessageType(u32),

    /// MessageLength disagrees with the bytes on the wire, or the
    /// concatenated chunks disagree with InformationBufferLength.
    #[error("declared length {declared} does not match actual {actual}")]
    LengthMismatch {
        /// Length claimed by the header.
        declared: usize,
        /// Length observed.
        actual: usize,
    },

    /// An empty packet set was handed to the reassembler.
    #[error("empty fragment set")]
    EmptyFragmentSet,

    /// Not every index in `[0, fragment_count)` was received.
    #[error(
        "incomplete fragment set for transaction {transaction_id}: \
         {received} of {expected} fragments"
    )]
    IncompleteFragmentSet {
        /// Transaction the set belongs to.
        transaction_id: u32,
        /// Distinct fragment indices received.
        received: u32,
        /// TotalFragments declared by the set.
        expected: u32,
    },

    /// The same fragment index appeared more than once.
    #[error("duplicate fragment {index} for transaction {transaction_id}")]
    DuplicateFragment {
        /// Transaction the duplicate belongs to.
        transaction_id: u32,
        /// Repeated fragment index.
        index: u32,
    },

    /// Packets from more than one transaction were mixed in one set.
    #[error("fragment set mixes transactions {expected} and {found}")]
    TransactionMismatch {
        /// Transaction id of the first packet in the set.
        expected: u32,
        /// Conflicting transaction id encountered.
        found: u32,
    },

    /// Fragments disagree about TotalFragments.
    #[error("fragment count mismatch: {expected} vs {found}")]
    FragmentCountMismatch {
        /// TotalFragments declared by the first packet.
        expected: u32,
        /// Conflicting TotalFragments encountered.
        found: u32,
    },

    /// CurrentFragment is outside `[0, fragment_count)`.
    #[error("fragment index {index} outside count {count}")]
    InvalidFragmentIndex {
        /// Offending CurrentFragment value.
        index: u32,
        /// TotalFragments declared by the set.
        count: u32,
    },

    /// Fragment 0 of a command-class message lacks its command header.
    #[error("first fragment of transaction {transaction_id} has no command header")]
    MissingCommandHeader {
        /// Transaction the defective fragment belongs to.
        transaction_id: u32,
    },
}

/// Result type alias using MbimError.
pub type Result<T> = std::result::Result<T, MbimError>;
