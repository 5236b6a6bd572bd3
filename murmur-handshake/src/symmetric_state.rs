use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher_state::CipherState;
use crate::crypto::aead::KEY_LEN;
use crate::crypto::hash::{self, HASH_LEN};
use crate::error::Error;

/// Noise SymmetricState — the chaining key, the handshake hash, and an
/// embedded CipherState.
///
/// Per Noise spec Section 5.2.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricState {
    cipher: CipherState,
    /// Chaining key (ck) — absorbs DH outputs via HKDF.
    ck: Zeroizing<[u8; HASH_LEN]>,
    /// Handshake hash (h) — binds every handshake byte, in order.
    h: [u8; HASH_LEN],
}

impl SymmetricState {
    /// Initialize from a protocol name.
    ///
    /// Per Noise spec Section 5.2: names up to the hash length are
    /// zero-padded, longer names are hashed.
    pub fn initialize(protocol_name: &str) -> Self {
        let name = protocol_name.as_bytes();
        let h = if name.len() <= HASH_LEN {
            let mut h = [0u8; HASH_LEN];
            h[..name.len()].copy_from_slice(name);
            h
        } else {
            hash::hash(name)
        };

        Self {
            cipher: CipherState::empty(),
            ck: Zeroizing::new(h),
            h,
        }
    }

    /// Mix input key material into the chaining key and install the derived
    /// cipher key.
    ///
    /// `(ck, temp_k) = HKDF(ck, input, 2)`, then `InitializeKey(temp_k)`.
    pub fn mix_key(&mut self, input_key_material: &[u8]) {
        let (new_ck, temp_k) = hash::hkdf2(&self.ck, input_key_material);
        *self.ck = *new_ck;

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&*temp_k);
        self.cipher.initialize_key(key);
        key.zeroize();
    }

    /// Mix data into the handshake hash: `h = HASH(h || data)`.
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = hash::hash_two(&self.h, data);
    }

    /// Mix input into the chaining key, the hash, and the cipher key at once.
    ///
    /// `(ck, temp_h, temp_k) = HKDF(ck, input, 3)`, then `MixHash(temp_h)`
    /// and `InitializeKey(temp_k)`. Defined by Noise for PSK operation; kept
    /// for completeness of the SymmetricState surface.
    pub fn mix_key_and_hash(&mut self, input_key_material: &[u8]) {
        let (new_ck, temp_h, temp_k) = hash::hkdf3(&self.ck, input_key_material);
        *self.ck = *new_ck;
        self.mix_hash(&*temp_h);

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&*temp_k);
        self.cipher.initialize_key(key);
        key.zeroize();
    }

    /// Encrypt plaintext with the current hash as AD, then mix the ciphertext
    /// into the hash.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let ciphertext = self.cipher.encrypt_with_ad(&self.h, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypt ciphertext with the current hash as AD, then mix the
    /// ciphertext into the hash.
    ///
    /// The hash used as AD is the value *before* the ciphertext is mixed in.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let plaintext = self.cipher.decrypt_with_ad(&self.h, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Split into the two transport CipherStates.
    ///
    /// `(temp_k1, temp_k2) = HKDF(ck, "", 2)`; the initiator sends with the
    /// first and receives with the second, the responder mirrors.
    pub fn split(self) -> ([u8; HASH_LEN], CipherState, CipherState) {
        let (temp_k1, temp_k2) = hash::hkdf2(&self.ck, &[]);

        let mut c1 = CipherState::empty();
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&*temp_k1);
        c1.initialize_key(key);

        let mut c2 = CipherState::empty();
        key.copy_from_slice(&*temp_k2);
        c2.initialize_key(key);
        key.zeroize();

        (self.h, c1, c2)
    }

    /// The current handshake hash.
    pub fn handshake_hash(&self) -> &[u8; HASH_LEN] {
        &self.h
    }

    /// The current encryption overhead (0 until a DH installs a key).
    pub fn overhead(&self) -> usize {
        self.cipher.overhead()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "Noise_NN_25519_ChaChaPoly_SHA256";

    #[test]
    fn initialize_pads_short_names() {
        let state = SymmetricState::initialize(NAME);
        // The 32-byte name is used verbatim as the initial hash.
        assert_eq!(&state.handshake_hash()[..], NAME.as_bytes());

        let short = SymmetricState::initialize("Noise_N_25519_ChaChaPoly_SHA256");
        assert_eq!(&short.handshake_hash()[..31], b"Noise_N_25519_ChaChaPoly_SHA256");
        assert_eq!(short.handshake_hash()[31], 0);
    }

    #[test]
    fn initialize_hashes_long_names() {
        let long = "Noise_NNpsk0+psk2_25519_ChaChaPoly_SHA256";
        let state = SymmetricState::initialize(long);
        assert_eq!(state.handshake_hash(), &hash::hash(long.as_bytes()));
    }

    #[test]
    fn mix_hash_changes_hash() {
        let mut state = SymmetricState::initialize(NAME);
        let before = *state.handshake_hash();
        state.mix_hash(b"prologue");
        assert_ne!(*state.handshake_hash(), before);
    }

    #[test]
    fn encrypt_and_hash_round_trip() {
        let mut alice = SymmetricState::initialize(NAME);
        let mut bob = SymmetricState::initialize(NAME);
        alice.mix_key(b"shared input");
        bob.mix_key(b"shared input");

        let ciphertext = alice.encrypt_and_hash(b"payload").unwrap();
        let plaintext = bob.decrypt_and_hash(&ciphertext).unwrap();
        assert_eq!(plaintext, b"payload");
        assert_eq!(alice.handshake_hash(), bob.handshake_hash());
    }

    #[test]
    fn hash_divergence_breaks_decryption() {
        let mut alice = SymmetricState::initialize(NAME);
        let mut bob = SymmetricState::initialize(NAME);
        alice.mix_key(b"shared input");
        bob.mix_key(b"shared input");
        // The hash is the AD; a divergent transcript must fail the tag check.
        bob.mix_hash(b"divergence");

        let ciphertext = alice.encrypt_and_hash(b"payload").unwrap();
        assert_eq!(
            bob.decrypt_and_hash(&ciphertext).unwrap_err(),
            Error::CryptoFailed
        );
    }

    #[test]
    fn mix_key_and_hash_tracks_both() {
        let mut alice = SymmetricState::initialize(NAME);
        let mut bob = SymmetricState::initialize(NAME);
        let before = *alice.handshake_hash();
        alice.mix_key_and_hash(b"ikm");
        bob.mix_key_and_hash(b"ikm");
        assert_ne!(*alice.handshake_hash(), before);
        assert_eq!(alice.handshake_hash(), bob.handshake_hash());

        let ciphertext = alice.encrypt_and_hash(b"x").unwrap();
        assert_eq!(bob.decrypt_and_hash(&ciphertext).unwrap(), b"x");
    }

    #[test]
    fn split_halves_agree() {
        let mut alice = SymmetricState::initialize(NAME);
        let mut bob = SymmetricState::initialize(NAME);
        alice.mix_key(b"dh output");
        bob.mix_key(b"dh output");

        let (hash_a, mut a1, mut a2) = alice.split();
        let (hash_b, mut b1, mut b2) = bob.split();
        assert_eq!(hash_a, hash_b);

        let ct = a1.encrypt_with_ad(&[], b"one way").unwrap();
        assert_eq!(b1.decrypt_with_ad(&[], &ct).unwrap(), b"one way");
        let ct = b2.encrypt_with_ad(&[], b"other way").unwrap();
        assert_eq!(a2.decrypt_with_ad(&[], &ct).unwrap(), b"other way");
    }
}
