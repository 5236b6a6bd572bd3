//! Identity binding between long-lived Ed25519 root keys and Noise statics.
//!
//! A peer that must prove its Noise static key signs the raw 32-byte static
//! public key with its root private key; the 64-byte signature is the
//! *proof*, transmitted inside the handshake right after the static key.
//! The receiving peer holds the sender's root public key and verifies the
//! pair through the verifier hook.

use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use murmur_handshake::PublicKey;

use crate::config::VerifierFn;

/// Sign a Noise static public key under a root key, producing the proof to
/// place in [`Config::static_public_key_proof`](crate::Config).
pub fn create_static_public_key_proof(
    root_private: &SigningKey,
    static_public: &PublicKey,
) -> Vec<u8> {
    root_private
        .sign(static_public.as_bytes())
        .to_bytes()
        .to_vec()
}

/// Build the verifier hook for
/// [`Config::public_key_verifier`](crate::Config): accepts a peer static key
/// only when its proof is a valid signature under `root_public`.
pub fn create_public_key_verifier(root_public: VerifyingKey) -> Arc<VerifierFn> {
    Arc::new(move |static_public: &[u8; 32], proof: &[u8; 64]| {
        let signature = Signature::from_bytes(proof);
        root_public.verify(static_public, &signature).is_ok()
    })
}
