use chacha20poly1305::{
    ChaCha20Poly1305, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::Zeroize;

use crate::error::Error;

/// AEAD key length in bytes.
pub const KEY_LEN: usize = 32;
/// AEAD tag length in bytes.
pub const TAG_LEN: usize = 16;
/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Build the 12-byte nonce from a u64 counter.
///
/// 4 bytes of zeros followed by the 64-bit little-endian counter,
/// per Noise spec Section 5.1 for ChaChaPoly.
fn make_nonce(n: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[4..].copy_from_slice(&n.to_le_bytes());
    nonce
}

/// Encrypt plaintext, returning `ciphertext || tag`.
pub fn encrypt(
    key: &[u8; KEY_LEN],
    nonce: u64,
    ad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let mut buffer = Vec::with_capacity(plaintext.len() + TAG_LEN);
    buffer.extend_from_slice(plaintext);
    let tag = cipher
        .encrypt_in_place_detached(&Nonce::from(make_nonce(nonce)), ad, &mut buffer)
        .map_err(|_| Error::CryptoFailed)?;
    buffer.extend_from_slice(&tag);
    Ok(buffer)
}

/// Decrypt `ciphertext || tag`, verifying the 16-byte AEAD tag.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: u64,
    ad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    if ciphertext.len() < TAG_LEN {
        return Err(Error::BadMessage);
    }
    let (body, tag) = ciphertext.split_at(ciphertext.len() - TAG_LEN);

    let cipher = ChaCha20Poly1305::new(key.into());
    let mut buffer = body.to_vec();
    match cipher.decrypt_in_place_detached(
        &Nonce::from(make_nonce(nonce)),
        ad,
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(Error::CryptoFailed)
        }
    }
}

/// Rekey function per Noise spec Section 11.3.
///
/// REKEY(k) = ENCRYPT(k, maxnonce, "", zeros)
/// where maxnonce = 2^64 - 1 and zeros = 32 zero bytes.
///
/// Returns the first 32 bytes of the output as the new key.
pub fn rekey(key: &[u8; KEY_LEN]) -> Result<[u8; KEY_LEN], Error> {
    let mut buffer = encrypt(key, u64::MAX, &[], &[0u8; KEY_LEN])?;
    let mut new_key = [0u8; KEY_LEN];
    new_key.copy_from_slice(&buffer[..KEY_LEN]);
    buffer.zeroize();
    Ok(new_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = [0x42u8; KEY_LEN];
        let plaintext = b"hello noise";
        let ad = b"associated data";

        let ciphertext = encrypt(&key, 0, ad, plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

        let decrypted = decrypt(&key, 0, ad, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_wrong_key_fails() {
        let key1 = [0x42u8; KEY_LEN];
        let key2 = [0x43u8; KEY_LEN];

        let ciphertext = encrypt(&key1, 0, &[], b"hello").unwrap();
        assert_eq!(decrypt(&key2, 0, &[], &ciphertext), Err(Error::CryptoFailed));
    }

    #[test]
    fn decrypt_wrong_nonce_fails() {
        let key = [0x42u8; KEY_LEN];

        let ciphertext = encrypt(&key, 0, &[], b"hello").unwrap();
        assert_eq!(decrypt(&key, 1, &[], &ciphertext), Err(Error::CryptoFailed));
    }

    #[test]
    fn decrypt_wrong_ad_fails() {
        let key = [0x42u8; KEY_LEN];

        let ciphertext = encrypt(&key, 0, b"ad1", b"hello").unwrap();
        assert_eq!(decrypt(&key, 0, b"ad2", &ciphertext), Err(Error::CryptoFailed));
    }

    #[test]
    fn decrypt_truncated_fails() {
        let key = [0x42u8; KEY_LEN];
        assert_eq!(decrypt(&key, 0, &[], &[0u8; 8]), Err(Error::BadMessage));
    }

    #[test]
    fn encrypt_empty_plaintext() {
        let key = [0x42u8; KEY_LEN];

        let ciphertext = encrypt(&key, 0, &[], &[]).unwrap();
        assert_eq!(ciphertext.len(), TAG_LEN);

        let decrypted = decrypt(&key, 0, &[], &ciphertext).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [0x42u8; KEY_LEN];

        let mut ciphertext = encrypt(&key, 0, &[], b"hello").unwrap();
        ciphertext[2] ^= 0x01;
        assert_eq!(decrypt(&key, 0, &[], &ciphertext), Err(Error::CryptoFailed));
    }

    #[test]
    fn rekey_produces_different_key() {
        let key = [0x42u8; KEY_LEN];
        let new_key = rekey(&key).unwrap();
        assert_ne!(key, new_key);
    }
}
