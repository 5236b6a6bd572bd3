use std::io;

use thiserror::Error;

/// Everything that can go wrong on a murmur connection.
///
/// The type is `Copy` so a poisoned connection can replay the error that
/// killed it on every subsequent operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The config is missing something the selected pattern requires.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(&'static str),
    /// A handshake message was malformed, truncated, or out of sequence.
    #[error("handshake protocol violation")]
    HandshakeProtocol,
    /// AEAD tag verification failed.
    #[error("message authentication failed")]
    DecryptAuth,
    /// The peer's static key proof did not verify against the root key.
    #[error("peer authentication failed")]
    PeerAuthFailure,
    /// A cipher state counter would wrap.
    #[error("nonce counter exhausted")]
    NonceExhaustion,
    /// A read or write was attempted out of turn on a half-duplex channel.
    #[error("half-duplex violation: the peer owns the floor")]
    HalfDuplexViolation,
    /// An I/O deadline elapsed.
    #[error("i/o deadline elapsed")]
    Timeout,
    /// The underlying stream was closed or failed.
    #[error("transport closed")]
    TransportClosed,
}

impl From<murmur_handshake::Error> for Error {
    fn from(err: murmur_handshake::Error) -> Self {
        use murmur_handshake::Error as Core;
        match err {
            Core::CryptoFailed => Error::DecryptAuth,
            Core::NonceExhausted => Error::NonceExhaustion,
            Core::ProofRejected => Error::PeerAuthFailure,
            Core::MissingKeyMaterial => Error::ConfigInvalid("missing key material"),
            Core::BadKey | Core::WrongState | Core::BadMessage => Error::HandshakeProtocol,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match err {
            Error::Timeout => io::ErrorKind::TimedOut,
            Error::TransportClosed => io::ErrorKind::ConnectionAborted,
            Error::ConfigInvalid(_) => io::ErrorKind::InvalidInput,
            Error::HalfDuplexViolation => io::ErrorKind::WouldBlock,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// Map a raw stream error to the connection error taxonomy.
pub(crate) fn from_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
        _ => Error::TransportClosed,
    }
}

/// Like [`from_io`], but attribute mid-record truncation and framing
/// violations to the protocol stage they occurred in.
pub(crate) fn from_record_io(err: io::Error, handshaking: bool) -> Error {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            if handshaking {
                Error::HandshakeProtocol
            } else {
                Error::DecryptAuth
            }
        }
        _ => Error::TransportClosed,
    }
}
