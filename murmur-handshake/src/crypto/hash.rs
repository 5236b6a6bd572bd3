use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Hash output length (SHA-256 = 32 bytes).
pub const HASH_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Compute SHA-256 of the input.
pub fn hash(input: &[u8]) -> [u8; HASH_LEN] {
    Sha256::digest(input).into()
}

/// Compute SHA-256 of two concatenated inputs without allocating.
pub fn hash_two(a: &[u8], b: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

/// HMAC-SHA256 over multiple data slices, fed sequentially to the MAC.
fn hmac_parts(key: &[u8; HASH_LEN], parts: &[&[u8]]) -> Zeroizing<[u8; HASH_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    for part in parts {
        mac.update(part);
    }
    Zeroizing::new(mac.finalize().into_bytes().into())
}

/// HMAC-SHA256 per RFC 2104.
pub fn hmac(key: &[u8; HASH_LEN], data: &[u8]) -> Zeroizing<[u8; HASH_LEN]> {
    hmac_parts(key, &[data])
}

/// HKDF with 2 output blocks, per Noise spec Section 4.3.
///
/// Returns `(output1, output2)` where:
/// - `output1 = HMAC(temp_key, 0x01)`
/// - `output2 = HMAC(temp_key, output1 || 0x02)`
pub fn hkdf2(
    chaining_key: &[u8; HASH_LEN],
    input_key_material: &[u8],
) -> (Zeroizing<[u8; HASH_LEN]>, Zeroizing<[u8; HASH_LEN]>) {
    let temp_key = hmac_parts(chaining_key, &[input_key_material]);
    let output1 = hmac_parts(&temp_key, &[&[0x01]]);
    let output2 = hmac_parts(&temp_key, &[&*output1, &[0x02]]);
    (output1, output2)
}

/// Three zeroized HKDF output blocks.
pub type HkdfOutput3 = (
    Zeroizing<[u8; HASH_LEN]>,
    Zeroizing<[u8; HASH_LEN]>,
    Zeroizing<[u8; HASH_LEN]>,
);

/// HKDF with 3 output blocks, used by `MixKeyAndHash`.
pub fn hkdf3(chaining_key: &[u8; HASH_LEN], input_key_material: &[u8]) -> HkdfOutput3 {
    let temp_key = hmac_parts(chaining_key, &[input_key_material]);
    let output1 = hmac_parts(&temp_key, &[&[0x01]]);
    let output2 = hmac_parts(&temp_key, &[&*output1, &[0x02]]);
    let output3 = hmac_parts(&temp_key, &[&*output2, &[0x03]]);
    (output1, output2, output3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_deterministic() {
        assert_eq!(hash(b"hello"), hash(b"hello"));
        assert_ne!(hash(b"hello"), hash(b"world"));
    }

    #[test]
    fn hash_two_equals_concatenated_hash() {
        let mut combined = Vec::new();
        combined.extend_from_slice(b"hello");
        combined.extend_from_slice(b"world");
        assert_eq!(hash_two(b"hello", b"world"), hash(&combined));
    }

    #[test]
    fn hmac_rfc4231_test_case_2() {
        // RFC 4231 test case 2 padded to our fixed 32-byte key type.
        let mut key = [0u8; HASH_LEN];
        key[..4].copy_from_slice(b"Jefe");
        let out = hmac(&key, b"what do ya want for nothing?");
        let expected = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        // HMAC("Jefe" zero-padded to 32 bytes) == HMAC("Jefe"): same block content.
        assert_eq!(*out, expected);
    }

    #[test]
    fn hmac_different_keys_and_data() {
        let key1 = [0x01u8; HASH_LEN];
        let key2 = [0x02u8; HASH_LEN];
        assert_ne!(*hmac(&key1, b"data"), *hmac(&key2, b"data"));
        assert_ne!(*hmac(&key1, b"data1"), *hmac(&key1, b"data2"));
    }

    #[test]
    fn hkdf2_produces_distinct_outputs() {
        let ck = [0x01u8; HASH_LEN];
        let (o1, o2) = hkdf2(&ck, b"ikm");
        assert_ne!(*o1, *o2);
    }

    #[test]
    fn hkdf3_first_two_outputs_match_hkdf2() {
        let ck = [0x01u8; HASH_LEN];
        let (a1, a2) = hkdf2(&ck, b"ikm");
        let (b1, b2, b3) = hkdf3(&ck, b"ikm");
        assert_eq!(*a1, *b1);
        assert_eq!(*a2, *b2);
        assert_ne!(*b2, *b3);
    }

    #[test]
    fn hkdf_deterministic() {
        let ck = [0x07u8; HASH_LEN];
        let (a1, a2) = hkdf2(&ck, b"ikm");
        let (b1, b2) = hkdf2(&ck, b"ikm");
        assert_eq!(*a1, *b1);
        assert_eq!(*a2, *b2);
    }
}
