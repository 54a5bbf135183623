use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::seeds::Seed;

type HmacSha256 = Hmac<Sha256>;

pub const UID_LEN: usize = 7;

/// Tag UID bytes fed into the derivation.
pub type Uid = [u8; UID_LEN];

/// Credential bundle for one tag.
///
/// `key` and `iv` are not needed to read a tag but are produced alongside
/// `pwd` so that write support can reuse the same derivation.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    pub key: [u8; 16],
    pub iv: [u8; 16],
    pub pwd: [u8; 4],
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey { .. }")
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message);
    Zeroizing::new(mac.finalize().into_bytes().into())
}

/// Substitute both nibbles of every byte through the seed's scramble map.
pub fn scramble(hash: &mut [u8], map: &[u8; 16]) {
    for b in hash.iter_mut() {
        *b = map[usize::from(*b & 0xf)] | (map[usize::from((*b >> 4) & 0xf)] << 4);
    }
}

/// Derive the key, IV and password of the tag with `uid` from `seed`.
///
/// HMAC-SHA256 of the UID under key A is nibble-scrambled and hashed again
/// under key B. The IV is the first 15 hash bytes with the last 8 hash bytes
/// folded into its head and the UID into its tail; byte 15 is always zero.
pub fn derive_key(uid: &Uid, seed: &Seed) -> DerivedKey {
    let mut hash = hmac_sha256(seed.hmac_key_a.as_bytes(), uid);
    scramble(&mut hash[..], &seed.scramble_map);
    let hash = hmac_sha256(seed.hmac_key_b.as_bytes(), &hash[..]);

    let mut out = DerivedKey {
        key: [0; 16],
        iv: [0; 16],
        pwd: [0; 4],
    };
    out.key.copy_from_slice(&hash[..16]);
    out.pwd.copy_from_slice(&hash[28..]);

    out.iv[..15].copy_from_slice(&hash[..15]);
    for (iv, h) in out.iv.iter_mut().zip(&hash[24..]) {
        *iv ^= h;
    }
    for (iv, u) in out.iv[8..].iter_mut().zip(uid) {
        *iv ^= u;
    }
    out.iv[15] = 0;

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::HmacKey;

    const UID: Uid = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
    const IDENTITY: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    fn seed(key_a: &str, key_b: &str, map: [u8; 16]) -> Seed {
        Seed {
            name: "test".to_string(),
            item_id: 0x1234,
            hmac_key_a: HmacKey::new(key_a.as_bytes()).unwrap(),
            hmac_key_b: HmacKey::new(key_b.as_bytes()).unwrap(),
            scramble_map: map,
        }
    }

    fn reference_hmac(key: &[u8], message: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(message);
        mac.finalize().into_bytes().into()
    }

    #[test]
    fn test_derive_deterministic() {
        let s = seed("keyA", "keyB", IDENTITY);
        assert_eq!(derive_key(&UID, &s), derive_key(&UID, &s));
    }

    #[test]
    fn test_identity_map_is_double_hmac() {
        let s = seed("keyA", "keyB", IDENTITY);
        let derived = derive_key(&UID, &s);

        let hash = reference_hmac(b"keyB", &reference_hmac(b"keyA", &UID));
        assert_eq!(derived.key, hash[..16]);
        assert_eq!(derived.pwd, hash[28..]);

        let mut iv = [0u8; 16];
        for i in 0..15 {
            iv[i] = hash[i];
        }
        for i in 0..8 {
            iv[i] ^= hash[24 + i];
        }
        for i in 0..7 {
            iv[8 + i] ^= UID[i];
        }
        iv[15] = 0;
        assert_eq!(derived.iv, iv);
    }

    #[test]
    fn test_iv_last_byte_zero() {
        for fill in 0u8..32 {
            let uid = [fill; UID_LEN];
            let s = seed("a", &format!("b{fill}"), IDENTITY);
            assert_eq!(derive_key(&uid, &s).iv[15], 0);
        }
    }

    #[test]
    fn test_different_keys_give_different_pwd() {
        let base = derive_key(&UID, &seed("keyA", "keyB", IDENTITY));
        let other_a = derive_key(&UID, &seed("keyA2", "keyB", IDENTITY));
        let other_b = derive_key(&UID, &seed("keyA", "keyB2", IDENTITY));
        assert_ne!(base.pwd, other_a.pwd);
        assert_ne!(base.pwd, other_b.pwd);
    }

    #[test]
    fn test_scramble_map_changes_result() {
        let mut reversed = IDENTITY;
        reversed.reverse();
        let a = derive_key(&UID, &seed("keyA", "keyB", IDENTITY));
        let b = derive_key(&UID, &seed("keyA", "keyB", reversed));
        assert_ne!(a.pwd, b.pwd);
    }

    #[test]
    fn test_scramble_substitutes_each_nibble() {
        let mut map = IDENTITY;
        map[0x3] = 0xa;
        map[0xc] = 0x5;
        let mut bytes = [0xc3u8, 0x3c, 0x00];
        scramble(&mut bytes, &map);
        assert_eq!(bytes, [0x5a, 0xa5, 0x00]);
    }

    #[test]
    fn test_scramble_bit_flip_stays_in_byte() {
        let mut map = IDENTITY;
        map.reverse();
        let original = [0x12u8, 0x34, 0x56, 0x78];
        for bit in 0..8 {
            let mut flipped = original;
            flipped[1] ^= 1 << bit;

            let mut a = original;
            let mut b = flipped;
            scramble(&mut a, &map);
            scramble(&mut b, &map);

            assert_eq!(a[0], b[0]);
            assert_eq!(a[2..], b[2..]);
            assert_ne!(a[1], b[1]);
            let expected = map[usize::from(flipped[1] & 0xf)]
                | (map[usize::from(flipped[1] >> 4)] << 4);
            assert_eq!(b[1], expected);
        }
    }

    #[test]
    fn test_debug_redacts() {
        let derived = derive_key(&UID, &seed("keyA", "keyB", IDENTITY));
        assert_eq!(format!("{derived:?}"), "DerivedKey { .. }");
    }
}
