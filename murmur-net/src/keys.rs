//! On-disk key storage.
//!
//! Two lowercase-hex file formats: the Ed25519 root identity is stored as
//! separate public and private files of 64 hex characters each (mode 0644
//! and 0400), and a Noise static key pair as a single 128-hex-character
//! file holding `private || public`. Any size or encoding mismatch is a
//! parse failure.

use std::fs;
use std::io;
use std::path::Path;

use ed25519_dalek::{SigningKey, VerifyingKey};
use murmur_handshake::KeyPair;
use rand_core::OsRng;
use zeroize::Zeroizing;

fn parse_failure(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn write_with_mode(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    fs::write(path, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

/// Decode a file of exactly `2 * N` lowercase-hex characters.
fn read_hex_exact<const N: usize>(path: &Path, what: &'static str) -> io::Result<[u8; N]> {
    let data = Zeroizing::new(fs::read(path)?);
    if data.len() != N * 2 {
        return Err(parse_failure(what));
    }
    let decoded = Zeroizing::new(hex::decode(&*data).map_err(|_| parse_failure(what))?);
    let mut out = [0u8; N];
    out.copy_from_slice(&decoded);
    Ok(out)
}

/// Generate an Ed25519 root key pair and store both halves.
///
/// The private key file is written with mode 0400, the public with 0644.
pub fn generate_and_save_root_key_pair(
    private_path: impl AsRef<Path>,
    public_path: impl AsRef<Path>,
) -> io::Result<SigningKey> {
    let root = SigningKey::generate(&mut OsRng);
    let private_hex = Zeroizing::new(hex::encode(root.to_bytes()));
    let public_hex = hex::encode(root.verifying_key().to_bytes());

    write_with_mode(private_path.as_ref(), private_hex.as_bytes(), 0o400)?;
    write_with_mode(public_path.as_ref(), public_hex.as_bytes(), 0o644)?;
    Ok(root)
}

/// Load an Ed25519 root public key from its hex file.
pub fn load_root_public_key(path: impl AsRef<Path>) -> io::Result<VerifyingKey> {
    let bytes = read_hex_exact::<32>(path.as_ref(), "root public key file is not 64 hex characters")?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| parse_failure("root public key is not a valid ed25519 key"))
}

/// Load an Ed25519 root private key from its hex file.
pub fn load_root_private_key(path: impl AsRef<Path>) -> io::Result<SigningKey> {
    let bytes =
        read_hex_exact::<32>(path.as_ref(), "root private key file is not 64 hex characters")?;
    Ok(SigningKey::from_bytes(&bytes))
}

/// Generate a Noise static key pair and store it as one hex file of
/// `private || public`.
pub fn generate_and_save_key_pair(path: impl AsRef<Path>) -> io::Result<KeyPair> {
    let pair = KeyPair::generate(&mut OsRng);
    let mut encoded = Zeroizing::new(String::with_capacity(128));
    encoded.push_str(&Zeroizing::new(hex::encode(pair.secret_bytes())));
    encoded.push_str(&hex::encode(pair.public.as_bytes()));
    write_with_mode(path.as_ref(), encoded.as_bytes(), 0o644)?;
    Ok(pair)
}

/// Load a Noise static key pair from its hex file.
///
/// The public half is re-derived from the private half; a stored public key
/// that does not match is a parse failure.
pub fn load_key_pair(path: impl AsRef<Path>) -> io::Result<KeyPair> {
    let bytes = read_hex_exact::<64>(path.as_ref(), "key pair file is not 128 hex characters")?;
    let mut private = [0u8; 32];
    private.copy_from_slice(&bytes[..32]);
    let pair = KeyPair::from_secret_bytes(private);
    if pair.public.as_bytes()[..] != bytes[32..] {
        return Err(parse_failure("key pair file is inconsistent"));
    }
    Ok(pair)
}
