//! Base-128 varint encoding used for tags, lengths, and integer payloads.
//!
//! Each byte carries seven value bits, least-significant group first. The
//! high bit of a byte is set when more bytes follow. A `u64` needs at most
//! ten bytes, and the tenth byte may only carry the single remaining bit.

/// Maximum encoded length of a `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Read a varint from a byte slice, returning `(value, bytes_consumed)`.
///
/// Returns `None` when the slice ends mid-varint or the encoding overflows
/// 64 bits.
pub fn read_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        // The tenth byte holds bit 63 only.
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return None;
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Whether a failed [`read_varint`] on `buf` was caused by running out of
/// bytes rather than by an overlong encoding.
pub(crate) fn varint_ran_out(buf: &[u8]) -> bool {
    buf.len() < MAX_VARINT_LEN && buf.iter().all(|&b| b & 0x80 != 0)
}

/// Compute the number of bytes needed to encode a value as a varint.
pub const fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Append the varint encoding of `value` to `buf`, returning the number of
/// bytes written.
#[allow(clippy::cast_possible_truncation)]
pub fn write_varint(buf: &mut Vec<u8>, value: u64) -> usize {
    let mut v = value;
    let mut written = 0;
    loop {
        written += 1;
        if v < 0x80 {
            buf.push(v as u8);
            return written;
        }
        buf.push((v as u8 & 0x7F) | 0x80);
        v >>= 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_roundtrip() {
        let test_values: &[u64] = &[
            0,
            1,
            127,
            128,
            300,
            16_383,
            16_384,
            2_097_151,
            2_097_152,
            268_435_455,
            268_435_456,
            u64::from(u32::MAX),
            u64::MAX - 1,
            u64::MAX,
        ];

        for &value in test_values {
            let mut buf = Vec::new();
            let written = write_varint(&mut buf, value);
            let (decoded, consumed) = read_varint(&buf).unwrap();
            assert_eq!(decoded, value, "roundtrip failed for {value}");
            assert_eq!(consumed, written);
            assert_eq!(written, varint_len(value), "varint_len mismatch for {value}");
        }
    }

    #[test]
    fn varint_known_vectors() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);

        let mut max = Vec::new();
        write_varint(&mut max, u64::MAX);
        assert_eq!(max.len(), MAX_VARINT_LEN);
        assert_eq!(max[9], 0x01);
    }

    #[test]
    fn read_varint_empty() {
        assert!(read_varint(&[]).is_none());
        assert!(varint_ran_out(&[]));
    }

    #[test]
    fn read_varint_stops_at_terminator() {
        assert_eq!(read_varint(&[0x08, 0xFF, 0xFF]), Some((8, 1)));
    }

    #[test]
    fn read_varint_truncated() {
        let buf = [0x80, 0x80];
        assert!(read_varint(&buf).is_none());
        assert!(varint_ran_out(&buf));
    }

    #[test]
    fn read_varint_overflow_rejected() {
        let mut buf = vec![0xFF; 9];
        buf.push(0x02);
        assert!(read_varint(&buf).is_none());
        assert!(!varint_ran_out(&buf));

        let eleven = vec![0x80; 11];
        assert!(read_varint(&eleven).is_none());
        assert!(!varint_ran_out(&eleven));
    }

    #[test]
    fn varint_len_boundaries() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(0x7F), 1);
        assert_eq!(varint_len(0x80), 2);
        assert_eq!(varint_len(0x3FFF), 2);
        assert_eq!(varint_len(0x4000), 3);
        assert_eq!(varint_len(u64::MAX), 10);
    }
}
