use zeroize::Zeroize;

use crate::cipher_state::CipherState;
use crate::crypto::aead::TAG_LEN;
use crate::crypto::hash::HASH_LEN;
use crate::error::Error;
use crate::patterns::Role;

/// Post-handshake transport encryption state.
///
/// Holds the two directional `CipherState`s produced by `split`:
/// the initiator sends with the first and receives with the second, the
/// responder mirrors. For one-way patterns only the initiator-to-responder
/// direction carries traffic.
pub struct TransportState {
    send: CipherState,
    recv: CipherState,
    handshake_hash: [u8; HASH_LEN],
}

impl Drop for TransportState {
    fn drop(&mut self) {
        self.handshake_hash.zeroize();
    }
}

impl core::fmt::Debug for TransportState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransportState").finish_non_exhaustive()
    }
}

impl TransportState {
    pub(crate) fn new(
        handshake_hash: [u8; HASH_LEN],
        c1: CipherState,
        c2: CipherState,
        role: Role,
    ) -> Self {
        let (send, recv) = match role {
            Role::Initiator => (c1, c2),
            Role::Responder => (c2, c1),
        };
        Self {
            send,
            recv,
            handshake_hash,
        }
    }

    /// Encrypt a payload for the peer, returning `ciphertext || tag`.
    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        self.send.encrypt_with_ad(&[], payload)
    }

    /// Decrypt a message received from the peer.
    pub fn read_message(&mut self, message: &[u8]) -> Result<Vec<u8>, Error> {
        self.recv.decrypt_with_ad(&[], message)
    }

    /// The final handshake hash — a channel binding value.
    ///
    /// Both sides hold the same value after a successful handshake.
    pub fn handshake_hash(&self) -> &[u8; HASH_LEN] {
        &self.handshake_hash
    }

    /// The AEAD tag overhead per transport message.
    pub fn overhead(&self) -> usize {
        TAG_LEN
    }

    /// Rekey the sending cipher (Noise spec Section 11.3).
    pub fn rekey_send(&mut self) -> Result<(), Error> {
        self.send.rekey()
    }

    /// Rekey the receiving cipher (Noise spec Section 11.3).
    pub fn rekey_recv(&mut self) -> Result<(), Error> {
        self.recv.rekey()
    }

    /// Hand out the handshake hash and the send/receive CipherStates, in
    /// that order, so a connection can own the directions independently.
    pub fn into_split(mut self) -> ([u8; HASH_LEN], CipherState, CipherState) {
        let send = core::mem::replace(&mut self.send, CipherState::empty());
        let recv = core::mem::replace(&mut self.recv, CipherState::empty());
        (self.handshake_hash, send, recv)
    }
}
