#![deny(unsafe_code)]

//! # murmur-handshake
//!
//! A pure, sans-IO implementation of the Noise protocol framework (draft 33)
//! specialized to a fixed ciphersuite: X25519, ChaCha20-Poly1305, SHA-256.
//! All fifteen non-PSK one-way and interactive patterns are supported, each
//! driven from a compiled-in token table.
//!
//! Beyond plain Noise, a handshake can carry an identity binding: the side
//! transmitting its static key may append a 64-byte *proof* (a signature
//! over that key by a long-lived root key), and the receiving side may
//! install a verifier callback that accepts or rejects it. Framing, I/O,
//! and the proof's signature scheme live in `murmur-net`.
//!
//! ## Security properties
//!
//! - X25519 all-zero shared secret rejection
//! - All key material zeroized on drop
//! - No panics on network input
//! - Fixed ciphersuite (no algorithm negotiation)

pub mod crypto;
pub mod error;
pub mod patterns;
pub mod types;

mod cipher_state;
mod handshake;
mod symmetric_state;
mod transport;

// Re-export the primary public API
pub use cipher_state::CipherState;
pub use error::Error;
pub use handshake::{HandshakeAction, HandshakeKeys, HandshakeState, PROOF_LEN, Verifier};
pub use patterns::{HandshakePattern, Role, Token};
pub use transport::TransportState;
pub use types::{KeyPair, PublicKey, StaticSecret};
