use std::{io, net};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates a local username that does not satisfy 4*256ice-char.
    #[error("username must be 4 to 256 ice-chars")]
    ErrInvalidUsername,

    /// Indicates a local password that does not satisfy 22*256ice-char.
    #[error("password must be 22 to 256 ice-chars")]
    ErrInvalidPassword,

    /// Indicates an invalid component count.
    #[error("components must be between 1 and 256")]
    ErrInvalidComponents,

    /// Indicates the relay transport policy was selected without a server
    /// able to provide relayed or reflexive candidates.
    #[error("relay transport policy requires a STUN and/or TURN server")]
    ErrRelayPolicyRequiresServer,

    /// Indicates a remote candidate arriving after end-of-candidates.
    #[error("cannot add remote candidate after end-of-candidates")]
    ErrEndOfCandidates,

    /// Indicates a remote candidate of a type the agent cannot check.
    #[error("unsupported candidate type")]
    ErrUnsupportedCandidateType,

    /// Indicates connect was called before candidate gathering completed.
    #[error("local candidate gathering was not performed")]
    ErrGatheringNotDone,

    /// Indicates connect was called without remote credentials.
    #[error("remote username or password is missing")]
    ErrRemoteCredentials,

    /// Indicates the check list was exhausted without nominating a pair for
    /// every component.
    #[error("ICE negotiation failed")]
    ErrNegotiationFailed,

    /// Indicates a send or receive without a nominated pair.
    #[error("not connected")]
    ErrNotConnected,

    /// Indicates the transport went away while receiving.
    #[error("connection lost")]
    ErrConnectionLost,

    /// Indicates the connection or endpoint is closed.
    #[error("the connection is closed")]
    ErrClosed,

    /// Indicates a second concurrent call to get_event.
    #[error("another task is already awaiting an event")]
    ErrAlreadyAwaitingEvent,

    /// Indicates no port of the allowed ephemeral port list could be bound.
    #[error("no allowed port could be bound")]
    ErrPort,

    /// Indicates set_selected_pair could not match a candidate.
    #[error("no candidate matches the given component and foundation")]
    ErrCandidateNotFound,

    /// Indicates a STUN transaction ran out of retransmissions.
    #[error("STUN transaction timed out")]
    ErrTransactionTimeout,

    /// Indicates a STUN transaction was answered with an error response.
    #[error("STUN transaction failed with error code {0}")]
    ErrTransactionFailed(u16),

    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Util(#[from] util::Error),
    #[error("{0}")]
    Stun(#[from] stun::Error),
    #[error("{0}")]
    Mdns(#[from] mdns::Error),
    #[error("{0}")]
    Turn(#[from] turn::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
