//! Version-key codec
//!
//! User keys live in the latest namespace as raw bytes. Superseded
//! versions live at `user_key || be_u64(!commit_ts)`: complementing the
//! timestamp makes newer versions sort first inside a user-key prefix, so
//! a forward seek to `encode_old_key(key, start_ts)` lands on the newest
//! version visible at `start_ts`.

use crate::error::{Error, Result};
use crate::ts::Ts;
use byteorder::{BigEndian, ByteOrder};

/// Length of the old-version key suffix.
pub const OLD_SUFFIX_LEN: usize = 8;

/// Encode the old-version key for `user_key` at `ts`.
pub fn encode_old_key(user_key: &[u8], ts: Ts) -> Vec<u8> {
    let mut out = Vec::with_capacity(user_key.len() + OLD_SUFFIX_LEN);
    out.extend_from_slice(user_key);
    let mut suffix = [0u8; OLD_SUFFIX_LEN];
    BigEndian::write_u64(&mut suffix, !ts);
    out.extend_from_slice(&suffix);
    out
}

/// Recover the timestamp from an old-version key.
pub fn decode_old_ts(encoded: &[u8]) -> Result<Ts> {
    if encoded.len() < OLD_SUFFIX_LEN {
        return Err(Error::codec("old-version key shorter than its suffix"));
    }
    Ok(!BigEndian::read_u64(&encoded[encoded.len() - OLD_SUFFIX_LEN..]))
}

/// The user-key portion of an old-version key.
pub fn old_user_key(encoded: &[u8]) -> &[u8] {
    &encoded[..encoded.len().saturating_sub(OLD_SUFFIX_LEN)]
}

/// True when `encoded` is an old-version key of `user_key`.
pub fn is_old_key_of(encoded: &[u8], user_key: &[u8]) -> bool {
    encoded.len() == user_key.len() + OLD_SUFFIX_LEN && encoded.starts_with(user_key)
}

/// True when the version addressed by `encoded` is visible at `start_ts`.
pub fn is_visible(encoded: &[u8], start_ts: Ts) -> bool {
    matches!(decode_old_ts(encoded), Ok(ts) if ts <= start_ts)
}

/// The smallest byte string strictly greater than every string with
/// prefix `key`.
///
/// Used to hop a forward cursor past a user key and all of its
/// old-version shadows. An all-0xFF key has no successor in a fixed
/// alphabet; the conventional append-zero result keeps cursors monotone.
pub fn prefix_next(key: &[u8]) -> Vec<u8> {
    let mut out = key.to_vec();
    let mut i = out.len();
    while i > 0 {
        i -= 1;
        if out[i] == 0xFF {
            continue;
        }
        out[i] += 1;
        out.truncate(i + 1);
        return out;
    }
    let mut out = key.to_vec();
    out.push(0x00);
    out
}

/// Fixed-width predecessor of `key`: decrements the trailing byte,
/// borrowing through 0x00 → 0xFF underflow. Returns `None` when `key` is
/// empty or all zeros (nothing precedes it).
pub fn prefix_prev(key: &[u8]) -> Option<Vec<u8>> {
    let mut out = key.to_vec();
    let mut i = out.len();
    while i > 0 {
        i -= 1;
        if out[i] == 0x00 {
            out[i] = 0xFF;
            continue;
        }
        out[i] -= 1;
        return Some(out);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::LOCK_VER;
    use proptest::prelude::*;

    #[test]
    fn test_old_key_round_trip() {
        let enc = encode_old_key(b"abc", 100);
        assert_eq!(old_user_key(&enc), b"abc");
        assert_eq!(decode_old_ts(&enc).unwrap(), 100);
        assert!(is_old_key_of(&enc, b"abc"));
        assert!(!is_old_key_of(&enc, b"ab"));
    }

    #[test]
    fn test_newer_versions_sort_first() {
        // Larger commit_ts ⇒ smaller complement ⇒ earlier in byte order.
        let newer = encode_old_key(b"k", 200);
        let older = encode_old_key(b"k", 100);
        assert!(newer < older);
        // The lock sentinel sorts before every real version.
        assert!(encode_old_key(b"k", LOCK_VER) < newer);
    }

    #[test]
    fn test_visibility() {
        let enc = encode_old_key(b"k", 100);
        assert!(is_visible(&enc, 100));
        assert!(is_visible(&enc, 150));
        assert!(!is_visible(&enc, 99));
    }

    #[test]
    fn test_prefix_next_simple() {
        assert_eq!(prefix_next(b"abc"), b"abd".to_vec());
        assert_eq!(prefix_next(b"a\xff"), b"b".to_vec());
        assert_eq!(prefix_next(b"\xff\xff"), b"\xff\xff\x00".to_vec());
    }

    #[test]
    fn test_prefix_next_bounds_old_versions() {
        let key = b"user".to_vec();
        let next = prefix_next(&key);
        for ts in [0u64, 1, 500, LOCK_VER] {
            let old = encode_old_key(&key, ts);
            assert!(old > key);
            assert!(old < next, "ts {ts}");
        }
    }

    #[test]
    fn test_prefix_prev() {
        assert_eq!(prefix_prev(b"abd"), Some(b"abc".to_vec()));
        assert_eq!(prefix_prev(b"ab\x00"), Some(b"aa\xff".to_vec()));
        assert_eq!(prefix_prev(b"\x00\x00"), None);
        assert_eq!(prefix_prev(b""), None);
    }

    proptest! {
        #[test]
        fn prop_old_key_round_trip(key in proptest::collection::vec(any::<u8>(), 0..40), ts in any::<u64>()) {
            let enc = encode_old_key(&key, ts);
            prop_assert_eq!(old_user_key(&enc), &key[..]);
            prop_assert_eq!(decode_old_ts(&enc).unwrap(), ts);
        }

        #[test]
        fn prop_prefix_next_is_strictly_greater(key in proptest::collection::vec(any::<u8>(), 0..40)) {
            prop_assert!(prefix_next(&key) > key);
        }

        #[test]
        fn prop_prefix_prev_is_strictly_less(key in proptest::collection::vec(any::<u8>(), 1..40)) {
            if let Some(prev) = prefix_prev(&key) {
                prop_assert!(prev < key);
            } else {
                prop_assert!(key.iter().all(|&b| b == 0));
            }
        }
    }
}
