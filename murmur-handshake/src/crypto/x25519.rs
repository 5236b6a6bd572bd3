use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret as DalekStaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// DH output length in bytes (X25519 = 32).
pub const DH_LEN: usize = 32;

/// A shared secret resulting from a Diffie-Hellman operation.
///
/// Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; DH_LEN]);

impl core::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

impl SharedSecret {
    /// Access the raw 32-byte shared secret.
    pub fn as_bytes(&self) -> &[u8; DH_LEN] {
        &self.0
    }
}

/// Perform DH between a local secret and a remote public key.
///
/// Returns the 32-byte shared secret, or `Error::BadKey` if the result is
/// the all-zeros point (low-order input). The check is required by RFC 7748
/// Section 6.1 and recommended by the Noise spec Section 12.1.
pub fn dh(local: &DalekStaticSecret, remote: &DalekPublicKey) -> Result<SharedSecret, Error> {
    let shared = local.diffie_hellman(remote);
    let is_zero = shared.as_bytes().ct_eq(&[0u8; DH_LEN]);
    if bool::from(is_zero) {
        Err(Error::BadKey)
    } else {
        Ok(SharedSecret(*shared.as_bytes()))
    }
}
