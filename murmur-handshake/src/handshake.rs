use rand_core::{CryptoRngCore, OsRng};
use x25519_dalek::PublicKey as DalekPublicKey;
use zeroize::Zeroize;

use crate::crypto::hash::HASH_LEN;
use crate::crypto::x25519::{self, DH_LEN, SharedSecret};
use crate::error::Error;
use crate::patterns::{HandshakePattern, Role, Token};
use crate::symmetric_state::SymmetricState;
use crate::transport::TransportState;
use crate::types::{KeyPair, PublicKey};

/// Length of a static public key proof (an Ed25519 signature).
pub const PROOF_LEN: usize = 64;

/// Callback that checks a peer's static public key against the 64-byte proof
/// that accompanied it. Returning `false` aborts the handshake.
pub type Verifier = Box<dyn Fn(&[u8; DH_LEN], &[u8; PROOF_LEN]) -> bool + Send + Sync>;

/// The next step the caller must take to advance the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Call `write_message()` to produce the next handshake message.
    WriteMessage,
    /// Call `read_message()` with the peer's next handshake message.
    ReadMessage,
    /// The handshake is complete. Call `into_transport()`.
    Complete,
}

/// Key material and identity hooks supplied at construction.
///
/// Which fields are mandatory depends on the pattern and role; see
/// [`HandshakePattern::requires_local_static`] and
/// [`HandshakePattern::requires_remote_static`]. The ephemeral slots exist so
/// tests can pin deterministic keys; production callers leave them `None`.
#[derive(Default)]
pub struct HandshakeKeys {
    pub local_static: Option<KeyPair>,
    pub local_ephemeral: Option<KeyPair>,
    pub remote_static: Option<PublicKey>,
    pub remote_ephemeral: Option<PublicKey>,
    /// Signature over our static public key, sent right after it.
    pub proof: Option<Vec<u8>>,
    /// Check applied to the peer's static key when it arrives in-band.
    pub verifier: Option<Verifier>,
}

/// One side of a Noise handshake, driven by the pattern's token script.
///
/// The state machine is a linear cursor over the pattern's messages: each
/// `write_message`/`read_message` call consumes exactly one message script,
/// strictly alternating between the two sides. There are no back-transitions;
/// any failure is fatal and the state should be discarded.
pub struct HandshakeState {
    /// `Option` so `into_transport()` can take it while Drop still runs.
    symmetric: Option<SymmetricState>,
    pattern: HandshakePattern,
    role: Role,
    /// Index of the next message script to execute.
    next_message: usize,
    s: Option<KeyPair>,
    e: Option<KeyPair>,
    rs: Option<[u8; DH_LEN]>,
    re: Option<[u8; DH_LEN]>,
    proof: Option<Vec<u8>>,
    verifier: Option<Verifier>,
}

impl core::fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeState")
            .field("pattern", &self.pattern)
            .field("role", &self.role)
            .field("next_message", &self.next_message)
            .finish_non_exhaustive()
    }
}

impl Drop for HandshakeState {
    fn drop(&mut self) {
        if let Some(ref mut v) = self.rs {
            v.zeroize();
        }
        if let Some(ref mut v) = self.re {
            v.zeroize();
        }
    }
}

impl HandshakeState {
    /// Create a handshake state for one side of `pattern`.
    ///
    /// Mixes the prologue and the pattern's pre-message public keys into the
    /// handshake hash, initiator side first. Fails with
    /// [`Error::MissingKeyMaterial`] when the pattern needs a key that
    /// `keys` does not carry, and with [`Error::BadKey`] when a supplied
    /// proof is not exactly [`PROOF_LEN`] bytes.
    pub fn new(
        pattern: HandshakePattern,
        role: Role,
        prologue: &[u8],
        keys: HandshakeKeys,
    ) -> Result<Self, Error> {
        let HandshakeKeys {
            local_static,
            local_ephemeral,
            remote_static,
            remote_ephemeral,
            proof,
            verifier,
        } = keys;

        if pattern.requires_local_static(role) && local_static.is_none() {
            return Err(Error::MissingKeyMaterial);
        }
        if pattern.requires_remote_static(role) && remote_static.is_none() {
            return Err(Error::MissingKeyMaterial);
        }
        if let Some(ref proof) = proof {
            if proof.len() != PROOF_LEN {
                return Err(Error::BadKey);
            }
        }

        let mut state = Self {
            symmetric: Some(SymmetricState::initialize(&pattern.protocol_name())),
            pattern,
            role,
            next_message: 0,
            s: local_static,
            e: local_ephemeral,
            rs: remote_static.map(|key| *key.as_bytes()),
            re: remote_ephemeral.map(|key| *key.as_bytes()),
            proof,
            verifier,
        };

        state.symmetric_mut()?.mix_hash(prologue);
        state.mix_pre_messages()?;
        Ok(state)
    }

    /// Hash the pre-message public keys, initiator side then responder side.
    fn mix_pre_messages(&mut self) -> Result<(), Error> {
        for side in [Role::Initiator, Role::Responder] {
            let tokens = match side {
                Role::Initiator => self.pattern.initiator_pre_messages(),
                Role::Responder => self.pattern.responder_pre_messages(),
            };
            for token in tokens {
                let key = if side == self.role {
                    match token {
                        Token::s => {
                            *self.s.as_ref().ok_or(Error::MissingKeyMaterial)?.public.as_bytes()
                        }
                        Token::e => {
                            *self.e.as_ref().ok_or(Error::MissingKeyMaterial)?.public.as_bytes()
                        }
                        _ => return Err(Error::BadMessage),
                    }
                } else {
                    match token {
                        Token::s => self.rs.ok_or(Error::MissingKeyMaterial)?,
                        Token::e => self.re.ok_or(Error::MissingKeyMaterial)?,
                        _ => return Err(Error::BadMessage),
                    }
                };
                self.symmetric_mut()?.mix_hash(&key);
            }
        }
        Ok(())
    }

    fn symmetric(&self) -> Result<&SymmetricState, Error> {
        self.symmetric.as_ref().ok_or(Error::WrongState)
    }

    fn symmetric_mut(&mut self) -> Result<&mut SymmetricState, Error> {
        self.symmetric.as_mut().ok_or(Error::WrongState)
    }

    /// What the caller should do next.
    pub fn next_action(&self) -> HandshakeAction {
        if self.next_message >= self.pattern.messages().len() {
            return HandshakeAction::Complete;
        }
        let initiator_turn = self.next_message % 2 == 0;
        let our_turn = initiator_turn == (self.role == Role::Initiator);
        if our_turn {
            HandshakeAction::WriteMessage
        } else {
            HandshakeAction::ReadMessage
        }
    }

    /// Whether this side is the initiator.
    pub fn is_initiator(&self) -> bool {
        self.role == Role::Initiator
    }

    /// The peer's static public key, once known.
    pub fn remote_static(&self) -> Option<[u8; DH_LEN]> {
        self.rs
    }

    /// The current handshake hash.
    pub fn handshake_hash(&self) -> Result<&[u8; HASH_LEN], Error> {
        Ok(self.symmetric()?.handshake_hash())
    }

    /// Produce the next handshake message, encrypting `payload` at its tail.
    ///
    /// Must only be called when it is this side's turn to send.
    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        self.write_message_with_rng(payload, &mut OsRng)
    }

    /// Like [`write_message`](Self::write_message), with an injected RNG for
    /// ephemeral generation.
    pub fn write_message_with_rng(
        &mut self,
        payload: &[u8],
        rng: &mut impl CryptoRngCore,
    ) -> Result<Vec<u8>, Error> {
        if self.next_action() != HandshakeAction::WriteMessage {
            return Err(Error::WrongState);
        }

        let tokens = self.pattern.messages()[self.next_message];
        let mut message = Vec::new();
        for token in tokens {
            match token {
                Token::e => {
                    let e = match self.e.take() {
                        Some(pinned) => pinned,
                        None => KeyPair::generate(rng),
                    };
                    message.extend_from_slice(e.public.as_bytes());
                    self.symmetric_mut()?.mix_hash(e.public.as_bytes());
                    self.e = Some(e);
                }
                Token::s => {
                    let s_pub = *self.s.as_ref().ok_or(Error::WrongState)?.public.as_bytes();
                    let ciphertext = self.symmetric_mut()?.encrypt_and_hash(&s_pub)?;
                    message.extend_from_slice(&ciphertext);
                    if let Some(proof) = self.proof.clone() {
                        let ciphertext = self.symmetric_mut()?.encrypt_and_hash(&proof)?;
                        message.extend_from_slice(&ciphertext);
                    }
                }
                dh => {
                    let shared = self.dh_token(*dh)?;
                    self.symmetric_mut()?.mix_key(shared.as_bytes());
                }
            }
        }

        let ciphertext = self.symmetric_mut()?.encrypt_and_hash(payload)?;
        message.extend_from_slice(&ciphertext);
        self.next_message += 1;
        Ok(message)
    }

    /// Consume the peer's next handshake message and return its payload.
    ///
    /// Must only be called when it is this side's turn to receive.
    pub fn read_message(&mut self, message: &[u8]) -> Result<Vec<u8>, Error> {
        if self.next_action() != HandshakeAction::ReadMessage {
            return Err(Error::WrongState);
        }

        let tokens = self.pattern.messages()[self.next_message];
        let mut rest = message;
        for token in tokens {
            match token {
                Token::e => {
                    if rest.len() < DH_LEN {
                        return Err(Error::BadMessage);
                    }
                    let (bytes, tail) = rest.split_at(DH_LEN);
                    let mut re = [0u8; DH_LEN];
                    re.copy_from_slice(bytes);
                    self.symmetric_mut()?.mix_hash(&re);
                    self.re = Some(re);
                    rest = tail;
                }
                Token::s => {
                    // 32 bytes on the wire until a DH installs a key, 32 + 16
                    // once the static travels encrypted.
                    let ciphertext_len = DH_LEN + self.symmetric()?.overhead();
                    if rest.len() < ciphertext_len {
                        return Err(Error::BadMessage);
                    }
                    let (ciphertext, tail) = rest.split_at(ciphertext_len);
                    let plaintext = self.symmetric_mut()?.decrypt_and_hash(ciphertext)?;
                    let rs: [u8; DH_LEN] =
                        plaintext.as_slice().try_into().map_err(|_| Error::BadMessage)?;
                    self.rs = Some(rs);
                    rest = tail;

                    if self.verifier.is_some() {
                        let proof_len = PROOF_LEN + self.symmetric()?.overhead();
                        if rest.len() < proof_len {
                            return Err(Error::BadMessage);
                        }
                        let (ciphertext, tail) = rest.split_at(proof_len);
                        let plaintext = self.symmetric_mut()?.decrypt_and_hash(ciphertext)?;
                        let proof: [u8; PROOF_LEN] =
                            plaintext.as_slice().try_into().map_err(|_| Error::BadMessage)?;
                        rest = tail;

                        let verifier = self.verifier.as_ref().ok_or(Error::WrongState)?;
                        if !verifier(&rs, &proof) {
                            return Err(Error::ProofRejected);
                        }
                    }
                }
                dh => {
                    let shared = self.dh_token(*dh)?;
                    self.symmetric_mut()?.mix_key(shared.as_bytes());
                }
            }
        }

        if rest.len() < self.symmetric()?.overhead() {
            return Err(Error::BadMessage);
        }
        let payload = self.symmetric_mut()?.decrypt_and_hash(rest)?;
        self.next_message += 1;
        Ok(payload)
    }

    /// Resolve a DH token to the local secret and remote public key it names.
    ///
    /// The pairing depends on the role: `es` is initiator-ephemeral with
    /// responder-static, `se` the reverse; `ee` and `ss` are symmetric.
    fn dh_token(&self, token: Token) -> Result<SharedSecret, Error> {
        let ephemeral = || self.e.as_ref().ok_or(Error::WrongState);
        let static_key = || self.s.as_ref().ok_or(Error::WrongState);
        let (local, remote) = match (token, self.role) {
            (Token::ee, _) => (ephemeral()?, self.re.ok_or(Error::WrongState)?),
            (Token::ss, _) => (static_key()?, self.rs.ok_or(Error::WrongState)?),
            (Token::es, Role::Initiator) => (ephemeral()?, self.rs.ok_or(Error::WrongState)?),
            (Token::es, Role::Responder) => (static_key()?, self.re.ok_or(Error::WrongState)?),
            (Token::se, Role::Initiator) => (static_key()?, self.re.ok_or(Error::WrongState)?),
            (Token::se, Role::Responder) => (ephemeral()?, self.rs.ok_or(Error::WrongState)?),
            _ => return Err(Error::BadMessage),
        };
        x25519::dh(local.secret.inner(), &DalekPublicKey::from(remote))
    }

    /// Convert the completed handshake into a transport state.
    ///
    /// The handshake state is consumed; its secrets are dropped (and
    /// zeroized) here.
    pub fn into_transport(mut self) -> Result<TransportState, Error> {
        if self.next_action() != HandshakeAction::Complete {
            return Err(Error::WrongState);
        }
        let role = self.role;
        let symmetric = self.symmetric.take().ok_or(Error::WrongState)?;
        let (hash, c1, c2) = symmetric.split();
        Ok(TransportState::new(hash, c1, c2, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pattern: HandshakePattern, a_keys: HandshakeKeys, b_keys: HandshakeKeys) {
        let mut a = HandshakeState::new(pattern, Role::Initiator, b"", a_keys).unwrap();
        let mut b = HandshakeState::new(pattern, Role::Responder, b"", b_keys).unwrap();
        loop {
            match a.next_action() {
                HandshakeAction::WriteMessage => {
                    let message = a.write_message(b"").unwrap();
                    b.read_message(&message).unwrap();
                }
                HandshakeAction::ReadMessage => {
                    let message = b.write_message(b"").unwrap();
                    a.read_message(&message).unwrap();
                }
                HandshakeAction::Complete => break,
            }
        }
        assert_eq!(
            a.handshake_hash().unwrap(),
            b.handshake_hash().unwrap()
        );
    }

    #[test]
    fn nn_smoke() {
        run(
            HandshakePattern::NN,
            HandshakeKeys::default(),
            HandshakeKeys::default(),
        );
    }

    #[test]
    fn out_of_turn_calls_rejected() {
        let mut a = HandshakeState::new(
            HandshakePattern::NN,
            Role::Initiator,
            b"",
            HandshakeKeys::default(),
        )
        .unwrap();
        assert_eq!(a.read_message(&[0u8; 32]).unwrap_err(), Error::WrongState);

        let mut b = HandshakeState::new(
            HandshakePattern::NN,
            Role::Responder,
            b"",
            HandshakeKeys::default(),
        )
        .unwrap();
        assert_eq!(b.write_message(b"").unwrap_err(), Error::WrongState);
    }

    #[test]
    fn missing_static_rejected_at_construction() {
        let err = HandshakeState::new(
            HandshakePattern::XX,
            Role::Initiator,
            b"",
            HandshakeKeys::default(),
        )
        .unwrap_err();
        assert_eq!(err, Error::MissingKeyMaterial);
    }

    #[test]
    fn missing_remote_static_rejected_at_construction() {
        let keys = HandshakeKeys {
            local_static: None,
            ..Default::default()
        };
        let err =
            HandshakeState::new(HandshakePattern::NK, Role::Initiator, b"", keys).unwrap_err();
        assert_eq!(err, Error::MissingKeyMaterial);
    }

    #[test]
    fn odd_sized_proof_rejected() {
        let mut rng = OsRng;
        let pair = KeyPair::generate(&mut rng);
        let keys = HandshakeKeys {
            local_static: Some(pair),
            proof: Some(vec![0u8; 63]),
            ..Default::default()
        };
        let err =
            HandshakeState::new(HandshakePattern::XN, Role::Initiator, b"", keys).unwrap_err();
        assert_eq!(err, Error::BadKey);
    }

    #[test]
    fn into_transport_before_completion_rejected() {
        let a = HandshakeState::new(
            HandshakePattern::NN,
            Role::Initiator,
            b"",
            HandshakeKeys::default(),
        )
        .unwrap();
        assert_eq!(a.into_transport().unwrap_err(), Error::WrongState);
    }

    #[test]
    fn short_message_rejected() {
        let mut b = HandshakeState::new(
            HandshakePattern::NN,
            Role::Responder,
            b"",
            HandshakeKeys::default(),
        )
        .unwrap();
        assert_eq!(b.read_message(&[0u8; 16]).unwrap_err(), Error::BadMessage);
    }
}
