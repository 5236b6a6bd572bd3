/// Errors that can occur while driving a Noise handshake or transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A cryptographic operation failed (AEAD tag mismatch, bad DH output).
    CryptoFailed,
    /// Key material is invalid (low-order point, wrong length).
    BadKey,
    /// An operation was attempted in the wrong handshake state.
    WrongState,
    /// A handshake message is malformed or truncated.
    BadMessage,
    /// The nonce counter has been exhausted (2^64 - 1 messages).
    NonceExhausted,
    /// The selected pattern needs a key the caller did not provide.
    MissingKeyMaterial,
    /// The peer's static public key proof did not verify.
    ProofRejected,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CryptoFailed => write!(f, "cryptographic operation failed"),
            Self::BadKey => write!(f, "invalid key material"),
            Self::WrongState => write!(f, "operation not valid in current state"),
            Self::BadMessage => write!(f, "malformed handshake message"),
            Self::NonceExhausted => write!(f, "nonce counter exhausted"),
            Self::MissingKeyMaterial => {
                write!(f, "pattern requires key material that was not provided")
            }
            Self::ProofRejected => write!(f, "peer static key proof rejected"),
        }
    }
}

impl core::error::Error for Error {}
