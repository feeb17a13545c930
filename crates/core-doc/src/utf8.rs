//! UTF-8 helpers for byte-oriented document backends.
//!
//! Documents stream content as code points but files and wire buffers
//! are bytes; these helpers cover the two operations the byte boundary
//! needs: a small codec usable on partial buffers, and `round_len`,
//! which clamps a byte count down to a code-point boundary so a read
//! never splits a character.

/// Encode `c`, returning the filled prefix of a 4-byte buffer.
pub fn encode(c: char, buf: &mut [u8; 4]) -> &[u8] {
    c.encode_utf8(buf).as_bytes()
}

/// Decode the first code point of `bytes`. Returns the char and how many
/// bytes it spans, `None` when the buffer starts mid-sequence, holds an
/// invalid sequence, or is too short (a truncated but so-far-valid
/// sequence also yields `None`; retry with more bytes).
pub fn decode(bytes: &[u8]) -> Option<(char, usize)> {
    let first = *bytes.first()?;
    let need = match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    if bytes.len() < need {
        return None;
    }
    let s = std::str::from_utf8(&bytes[..need]).ok()?;
    let c = s.chars().next()?;
    Some((c, need))
}

/// Largest `k <= n` such that `bytes[..k]` ends on a code-point
/// boundary. Never advances past `n`; if no boundary exists within the
/// final 4 bytes (not valid UTF-8), `n` is returned unchanged.
pub fn round_len(bytes: &[u8], n: usize) -> usize {
    let n = n.min(bytes.len());
    let mut k = n;
    // A boundary byte is anything but a continuation byte. A lead byte
    // sits at most 3 positions back, so 4 failed probes mean the stream
    // is not UTF-8 and `n` comes back unchanged.
    while k > 0 && n - k < 4 {
        if k == bytes.len() || bytes[k] & 0xC0 != 0x80 {
            return k;
        }
        k -= 1;
    }
    if k == 0 && n < 4 {
        return 0;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_every_code_point() {
        let mut buf = [0u8; 4];
        for cp in 0..=0x10FFFFu32 {
            let Some(c) = char::from_u32(cp) else { continue };
            let enc = encode(c, &mut buf);
            let (back, used) = decode(enc).expect("own encoding decodes");
            assert_eq!(back, c, "code point U+{cp:04X}");
            assert_eq!(used, enc.len());
        }
    }

    #[test]
    fn decode_rejects_partial_and_stray() {
        let mut buf = [0u8; 4];
        let enc = encode('é', &mut buf).to_vec();
        assert_eq!(decode(&enc[..1]), None, "truncated sequence");
        assert_eq!(decode(&enc[1..]), None, "stray continuation byte");
        assert_eq!(decode(&[0xFF, 0x20]), None, "invalid lead byte");
        assert_eq!(decode(b""), None);
    }

    #[test]
    fn round_len_stops_on_boundaries() {
        let s = "aé😀".as_bytes(); // 1 + 2 + 4 bytes
        assert_eq!(round_len(s, 0), 0);
        assert_eq!(round_len(s, 1), 1);
        assert_eq!(round_len(s, 2), 1, "inside the two-byte char");
        assert_eq!(round_len(s, 3), 3);
        for k in 4..7 {
            assert_eq!(round_len(s, k), 3, "inside the four-byte char");
        }
        assert_eq!(round_len(s, 7), 7);
        assert_eq!(round_len(s, 99), 7, "clamped to buffer length");
    }

    #[test]
    fn round_len_never_exceeds_n() {
        let s = "héllo wörld".as_bytes();
        for n in 0..=s.len() {
            let k = round_len(s, n);
            assert!(k <= n);
            assert!(std::str::from_utf8(&s[..k]).is_ok(), "boundary at {k}");
        }
    }
}
