use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::aead::{self, KEY_LEN, TAG_LEN};
use crate::error::Error;

/// Noise CipherState — an AEAD key slot with a 64-bit message counter.
///
/// Per Noise spec Section 5.1. The counter advances only on success, so a
/// failed decrypt leaves the state untouched for the caller to tear down.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherState {
    /// The AEAD key, or `None` if uninitialized.
    key: Option<[u8; KEY_LEN]>,
    /// Nonce counter, incremented after each encryption/decryption.
    #[zeroize(skip)]
    nonce: u64,
}

impl CipherState {
    /// Create an empty (uninitialized) CipherState.
    pub fn empty() -> Self {
        Self {
            key: None,
            nonce: 0,
        }
    }

    /// Initialize with a key, resetting the nonce counter to zero.
    pub fn initialize_key(&mut self, key: [u8; KEY_LEN]) {
        self.key = Some(key);
        self.nonce = 0;
    }

    /// Whether this CipherState has a key set.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt plaintext with associated data, returning `ciphertext || tag`.
    ///
    /// If no key is set, returns the plaintext unchanged (Noise pre-key
    /// behavior).
    pub fn encrypt_with_ad(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.key {
            None => Ok(plaintext.to_vec()),
            Some(key) => {
                if self.nonce == u64::MAX {
                    // Nonce 2^64-1 is reserved for rekey (Noise spec §11.3)
                    return Err(Error::NonceExhausted);
                }
                let ciphertext = aead::encrypt(key, self.nonce, ad, plaintext)?;
                self.nonce += 1;
                Ok(ciphertext)
            }
        }
    }

    /// Decrypt `ciphertext || tag` with associated data.
    ///
    /// If no key is set, returns the ciphertext unchanged (Noise pre-key
    /// behavior).
    pub fn decrypt_with_ad(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.key {
            None => Ok(ciphertext.to_vec()),
            Some(key) => {
                if self.nonce == u64::MAX {
                    return Err(Error::NonceExhausted);
                }
                let plaintext = aead::decrypt(key, self.nonce, ad, ciphertext)?;
                self.nonce += 1;
                Ok(plaintext)
            }
        }
    }

    /// Rekey per Noise spec Section 11.3. Does not reset the nonce counter.
    pub fn rekey(&mut self) -> Result<(), Error> {
        if let Some(ref mut key) = self.key {
            *key = aead::rekey(key)?;
        }
        Ok(())
    }

    /// The overhead added by encryption (0 if no key, the tag length otherwise).
    pub fn overhead(&self) -> usize {
        if self.has_key() { TAG_LEN } else { 0 }
    }

    #[cfg(test)]
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    #[cfg(test)]
    pub(crate) fn nonce(&self) -> u64 {
        self.nonce
    }
}
