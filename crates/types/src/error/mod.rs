//! The unified error taxonomy for the plexus SDK.
//!
//! Every fallible operation returns an [`Error`]: a numeric [`ErrorKind`]
//! plus a human-readable message. Wrapping an underlying cause preserves the
//! outer kind and stringifies the inner error, so a kind can always be
//! matched on without downcasting. Each kind also exposes a stable,
//! machine-readable string code for logs and wire surfaces.
//!
//! Panics are reserved for programmer errors; protocol and I/O conditions
//! are always reported through this type.

use thiserror::Error as ThisError;

/// The numeric kind carried by every [`Error`].
///
/// The discriminants are part of the wire surface (errors travel inside
/// transactions as values) and must remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ErrorKind {
    /// No error; never constructed into an [`Error`].
    Nil = 0,
    /// The operation is recognized but intentionally not implemented.
    Unimplemented = 1,
    /// An internal invariant did not hold.
    AssertFailed = 2,
    /// A transaction failed to parse or carried an invalid preamble.
    MalformedTx = 3,
    /// A transaction op referenced data outside its store or was invalid.
    BadTxOp = 4,
    /// A transaction op carried a nil edit UID where one is required.
    BadTxEdit = 5,
    /// Login or session establishment failed.
    LoginFailed = 6,
    /// A client request was malformed or unparsable.
    BadRequest = 7,
    /// The context is not ready to serve the operation.
    ContextNotReady = 8,
    /// A storage backend reported a failure.
    StorageFailure = 9,
    /// A commit was rejected or could not complete.
    CommitFailed = 10,
    /// The requested item does not exist. Also surfaced through the
    /// [`Error::attr_not_found`], [`Error::channel_not_found`], and
    /// [`Error::path_not_found`] constructors.
    ItemNotFound = 11,
    /// The stream or transport closed normally.
    NotConnected = 12,
    /// The client request was closed before completion.
    RequestClosed = 13,
    /// A pin could not be created or served.
    PinFailed = 14,
    /// The session or host is shutting down.
    ShuttingDown = 15,
    /// The operation timed out.
    Timeout = 16,
    /// Authentication failed or was missing.
    AuthFailed = 17,
    /// The operation was cancelled by its context.
    Cancelled = 18,
    /// An error of unrecognized origin.
    Unnamed = 19,
}

impl ErrorKind {
    /// Returns the unique, stable string identifier for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Nil => "NIL",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::AssertFailed => "ASSERT_FAILED",
            Self::MalformedTx => "MALFORMED_TX",
            Self::BadTxOp => "BAD_TX_OP",
            Self::BadTxEdit => "BAD_TX_EDIT",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::BadRequest => "BAD_REQUEST",
            Self::ContextNotReady => "CONTEXT_NOT_READY",
            Self::StorageFailure => "STORAGE_FAILURE",
            Self::CommitFailed => "COMMIT_FAILED",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::NotConnected => "NOT_CONNECTED",
            Self::RequestClosed => "REQUEST_CLOSED",
            Self::PinFailed => "PIN_FAILED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Timeout => "TIMEOUT",
            Self::AuthFailed => "AUTH_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unnamed => "UNNAMED",
        }
    }

    /// Recovers a kind from its stable numeric discriminant, falling back to
    /// [`ErrorKind::Unnamed`] for values minted by a newer peer.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Nil,
            1 => Self::Unimplemented,
            2 => Self::AssertFailed,
            3 => Self::MalformedTx,
            4 => Self::BadTxOp,
            5 => Self::BadTxEdit,
            6 => Self::LoginFailed,
            7 => Self::BadRequest,
            8 => Self::ContextNotReady,
            9 => Self::StorageFailure,
            10 => Self::CommitFailed,
            11 => Self::ItemNotFound,
            12 => Self::NotConnected,
            13 => Self::RequestClosed,
            14 => Self::PinFailed,
            15 => Self::ShuttingDown,
            16 => Self::Timeout,
            17 => Self::AuthFailed,
            18 => Self::Cancelled,
            _ => Self::Unnamed,
        }
    }

    /// Forms an [`Error`] of this kind with the given message.
    pub fn err(self, msg: impl Into<String>) -> Error {
        Error {
            kind: self,
            msg: msg.into(),
        }
    }

    /// Forms an [`Error`] of this kind whose message is the stringified
    /// cause. The outer kind wins; the cause is preserved as text only.
    pub fn wrap(self, cause: impl std::fmt::Display) -> Error {
        Error {
            kind: self,
            msg: cause.to_string(),
        }
    }
}

/// The tagged error type returned by every fallible SDK operation.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("{}: {}", .kind.code(), .msg)]
pub struct Error {
    /// The numeric kind of this error.
    pub kind: ErrorKind,
    /// Human-readable detail; may be empty.
    pub msg: String,
}

impl Error {
    /// Tests whether `err` carries one of the given kinds.
    pub fn is_kind(err: &Error, kinds: &[ErrorKind]) -> bool {
        kinds.iter().any(|k| *k == err.kind)
    }

    /// An attribute lookup miss (alias of [`ErrorKind::ItemNotFound`]).
    pub fn attr_not_found(msg: impl Into<String>) -> Error {
        ErrorKind::ItemNotFound.err(msg)
    }

    /// A channel/node lookup miss (alias of [`ErrorKind::ItemNotFound`]).
    pub fn channel_not_found(msg: impl Into<String>) -> Error {
        ErrorKind::ItemNotFound.err(msg)
    }

    /// A path lookup miss (alias of [`ErrorKind::ItemNotFound`]).
    pub fn path_not_found(msg: impl Into<String>) -> Error {
        ErrorKind::ItemNotFound.err(msg)
    }
}

/// Stock errors for conditions raised from many call sites.
pub mod stock {
    use super::{Error, ErrorKind};

    /// The stream or transport closed normally.
    pub fn stream_closed() -> Error {
        ErrorKind::NotConnected.err("stream closed")
    }

    /// The session or host is shutting down.
    pub fn shutting_down() -> Error {
        ErrorKind::ShuttingDown.err("shutting down")
    }

    /// A transaction failed to parse.
    pub fn malformed_tx() -> Error {
        ErrorKind::MalformedTx.err("bad varint")
    }

    /// The client request was closed before completion.
    pub fn request_closed() -> Error {
        ErrorKind::RequestClosed.err("client request closed")
    }

    /// Nothing was supplied to pin.
    pub fn nothing_to_pin() -> Error {
        ErrorKind::PinFailed.err("nothing to pin")
    }

    /// The operation is recognized but intentionally not implemented.
    pub fn unimplemented() -> Error {
        ErrorKind::Unimplemented.err("not implemented")
    }
}
