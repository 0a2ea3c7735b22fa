//! Main Crate Error

use crate::common::Id;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Chord ring error enum.
pub enum Error {
    /// Identifier spaces are limited to 1..=64 bits.
    #[error("invalid identifier space width: {0} bits (expected 1..=64)")]
    InvalidBits(u32),

    /// The identifier does not fit in the ring's identifier space.
    #[error("identifier {0} does not fit in a {1}-bit identifier space")]
    IdOutOfRange(Id, u32),

    /// No two ring members may share an identifier.
    #[error("a node with identifier {0} is already registered")]
    DuplicateId(Id),

    /// The identifier does not name a registered node.
    #[error("no node with identifier {0} is registered")]
    UnknownNode(Id),

    /// The operation requires a node that has joined the ring.
    #[error("node {0} has not joined the ring")]
    NotJoined(Id),

    /// A node can only join once.
    #[error("node {0} already joined the ring")]
    AlreadyJoined(Id),

    /// Joining without a bootstrap is only valid in an empty ring.
    #[error("cannot start a new ring while {0} member(s) are joined")]
    RingNotEmpty(usize),
}

pub type Result<T> = core::result::Result<T, Error>;
