type Result<T, E = BitfieldError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BitfieldError {

    #[error("cannot create empty bitfield")]
    ZeroLength,

    #[error("bitfield length {len} does not end in the final byte of a {bytes} byte buffer")]
    LengthMismatch {
        len: usize,
        bytes: usize,
    },

    #[error("bitfield has {bytes} bytes and {len} bits, got index {index}")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        bytes: usize,
    },

    // Only reachable when the length was set inconsistently with the buffer.
    #[error("index {index} falls in byte {byte} of a {bytes} byte buffer, bitfield length is misconfigured")]
    Misconfigured {
        index: usize,
        byte: usize,
        bytes: usize,
    },

    #[error("bit lengths unequal, expected {expected}, got {found}")]
    UnequalLength {
        expected: usize,
        found: usize,
    },

    #[error("byte lengths unequal, expected {expected}, got {found}")]
    UnequalBytes {
        expected: usize,
        found: usize,
    },
}

/// Fixed size set of piece indices, most significant bit first within each
/// byte (the layout of the peer wire "bitfield" message).
///
/// `next_false` and `next_true` are lower bounds on the lowest index holding
/// that value: every bit below the cursor is known not to hold it. A cursor
/// equal to `len` means the scan is exhausted. Mutations only ever lower a
/// cursor; scans move it forward.
#[derive(Debug, Clone)]
pub struct Bitfield {

    // Number of addressable bits, may not be a multiple of 8.
    len: usize,

    bytes: Vec<u8>,

    next_false: usize,

    next_true: usize,

}

#[inline]
fn mask(index: usize) -> u8 {
    0x80 >> (index % 8)
}

impl Bitfield {

    // All zero bitfield of `len` bits.
    pub fn new(len: usize) -> Result<Bitfield> {
        if len == 0 {
            return Err(BitfieldError::ZeroLength);
        }
        Ok(Bitfield {
            len,
            bytes: vec![0; (len + 7) / 8],
            next_false: 0,
            next_true: 0,
        })
    }

    // Takes ownership of `bytes`, which must be exactly as long as `len` bits need.
    pub fn wrap(bytes: Vec<u8>, len: usize) -> Result<Bitfield> {
        if len == 0 {
            return Err(BitfieldError::ZeroLength);
        }
        let upper = bytes.len() * 8;
        let lower = upper.saturating_sub(8);
        if !(lower < len && len <= upper) {
            return Err(BitfieldError::LengthMismatch { len, bytes: bytes.len() });
        }
        Ok(Bitfield {
            len,
            bytes,
            next_false: 0,
            next_true: 0,
        })
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn into_bytes(self) -> Vec<u8> { self.bytes }

    // Byte holding bit `index`, after checking both the logical length and the buffer.
    fn locate(&self, index: usize) -> Result<usize> {
        if index >= self.len {
            return Err(BitfieldError::IndexOutOfRange {
                index,
                len: self.len,
                bytes: self.bytes.len(),
            });
        }
        let byte = index / 8;
        if byte >= self.bytes.len() {
            return Err(BitfieldError::Misconfigured {
                index,
                byte,
                bytes: self.bytes.len(),
            });
        }
        Ok(byte)
    }

    pub fn get(&self, index: usize) -> Result<bool> {
        let byte = self.locate(index)?;
        Ok(self.bytes[byte] & mask(index) != 0)
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        let byte = self.locate(index)?;
        if value {
            self.bytes[byte] |= mask(index);
            self.next_true = self.next_true.min(index);
        } else {
            self.bytes[byte] &= !mask(index);
            self.next_false = self.next_false.min(index);
        }
        Ok(())
    }

    // Flips bit `index`, returning its new value.
    pub fn swap(&mut self, index: usize) -> Result<bool> {
        let value = !self.get(index)?;
        self.set(index, value)?;
        Ok(value)
    }

    /// Lowest index whose bit is unset, and whether the scan is exhausted.
    ///
    /// When exhausted the index equals `len()`. Repeated calls without an
    /// intervening mutation return immediately.
    pub fn next_false(&mut self) -> (usize, bool) {
        let index = self.scan(self.next_false, false);
        self.next_false = index;
        (index, index == self.len)
    }

    /// Lowest index whose bit is set, see `next_false`.
    pub fn next_true(&mut self) -> (usize, bool) {
        let index = self.scan(self.next_true, true);
        self.next_true = index;
        (index, index == self.len)
    }

    // First index at or after `from` holding `want`, or `len`.
    fn scan(&self, from: usize, want: bool) -> usize {
        let mut index = from;
        while index < self.len {
            let byte = index / 8;
            let Some(&raw) = self.bytes.get(byte) else {
                break;
            };
            let bits = if want { raw } else { !raw };
            // Drop bits before `index` so a mid-byte resume sees only the rest of the byte.
            let remaining = bits & (0xff >> (index % 8));
            if remaining != 0 {
                let found = byte * 8 + remaining.leading_zeros() as usize;
                // A hit in the padding bits past `len` counts as exhausted.
                return found.min(self.len);
            }
            index = (byte + 1) * 8;
        }
        self.len
    }

    fn check_same_shape(&self, other: &Bitfield) -> Result<()> {
        if self.len != other.len {
            return Err(BitfieldError::UnequalLength { expected: self.len, found: other.len });
        }
        if self.bytes.len() != other.bytes.len() {
            return Err(BitfieldError::UnequalBytes {
                expected: self.bytes.len(),
                found: other.bytes.len(),
            });
        }
        Ok(())
    }

    // Conservative cursors for `self AND NOT other`. A set bit in the result is
    // set in self. An unset bit is unset in self or set in other.
    fn sub_cursors(&self, other: &Bitfield) -> (usize, usize) {
        let next_false = self.next_false.min(other.next_false).min(other.next_true);
        let next_true = self.next_true.min(other.next_true);
        (next_false, next_true)
    }

    /// Bits set in `self` but not in `other`, e.g. the pieces a peer has that
    /// we still need. Cursors are seeded as lower bounds, not recomputed.
    pub fn sub(&self, other: &Bitfield) -> Result<Bitfield> {
        self.check_same_shape(other)?;
        let bytes = self.bytes.iter()
            .zip(&other.bytes)
            .map(|(a, b)| a & !b)
            .collect();
        let (next_false, next_true) = self.sub_cursors(other);
        Ok(Bitfield {
            len: self.len,
            bytes,
            next_false,
            next_true,
        })
    }

    // Same as `sub`, reusing the buffer of `into`.
    pub fn sub_into(&self, into: &mut Bitfield, other: &Bitfield) -> Result<()> {
        if self.len != into.len {
            return Err(BitfieldError::UnequalLength { expected: self.len, found: into.len });
        }
        self.check_same_shape(other)?;
        if self.bytes.len() != into.bytes.len() {
            return Err(BitfieldError::UnequalBytes {
                expected: self.bytes.len(),
                found: into.bytes.len(),
            });
        }
        for ((dst, a), b) in into.bytes.iter_mut().zip(&self.bytes).zip(&other.bytes) {
            *dst = a & !b;
        }
        let (next_false, next_true) = self.sub_cursors(other);
        into.next_false = next_false;
        into.next_true = next_true;
        Ok(())
    }

    // Byte equality, erroring when the two are not comparable.
    pub fn equals(&self, other: &Bitfield) -> Result<bool> {
        self.check_same_shape(other)?;
        Ok(self.bytes == other.bytes)
    }

    // Set bits below `len`, padding excluded.
    pub fn count_ones(&self) -> usize {
        let full = self.len / 8;
        let whole: usize = self.bytes.iter()
            .take(full)
            .map(|b| b.count_ones() as usize)
            .sum();
        let spare = self.len % 8;
        let tail = match self.bytes.get(full) {
            // High `spare` bits of the final byte are in range, the rest is padding.
            Some(&b) if spare != 0 => (b & !(0xff >> spare)).count_ones() as usize,
            _ => 0,
        };
        whole + tail
    }
}

// Cursors are a cache, they take no part in equality.
impl PartialEq for Bitfield {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bytes == other.bytes
    }
}

impl Eq for Bitfield {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    // Built by hand, skipping validation, like a struct literal would.
    fn raw(bytes: &[u8], len: usize) -> Bitfield {
        Bitfield { len, bytes: bytes.to_vec(), next_false: 0, next_true: 0 }
    }

    #[test]
    fn test_get() {
        assert_eq!(raw(&[0b0100_0000], 8).get(1), Ok(true));
        assert_eq!(raw(&[0b0000_1010, 0b0000_0001], 15).get(11), Ok(false));
        assert_eq!(raw(&[0b0000_1010, 0b0000_0001], 16).get(15), Ok(true));
    }

    #[test]
    fn test_get_out_of_range() {
        assert!(matches!(raw(&[0], 7).get(7), Err(BitfieldError::IndexOutOfRange { .. })));
        assert!(matches!(raw(&[0b0000_1010, 0b0001_0001], 11).get(14), Err(BitfieldError::IndexOutOfRange { .. })));
        assert!(matches!(raw(&[0], 0).get(0), Err(BitfieldError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_length_past_buffer() {
        let mut bf = raw(&[0, 0], 17);
        assert!(matches!(bf.get(16), Err(BitfieldError::Misconfigured { byte: 2, .. })));
        assert!(matches!(bf.set(16, true), Err(BitfieldError::Misconfigured { .. })));
        assert!(matches!(bf.swap(16), Err(BitfieldError::Misconfigured { .. })));
        // Scans stop at the end of the buffer instead of reading past it.
        assert_eq!(bf.next_true(), (17, true));
    }

    #[test]
    fn test_set() {
        let mut bf = raw(&[0b0000_1010], 8);
        bf.set(1, true).unwrap();
        assert_eq!(bf.as_bytes(), &[0b0100_1010]);

        let mut bf = raw(&[0b0000_1010, 0b0001_0001], 15);
        bf.set(11, false).unwrap();
        assert_eq!(bf.as_bytes(), &[0b0000_1010, 0b0000_0001]);

        assert!(raw(&[0], 7).set(7, true).is_err());
        assert!(raw(&[0b0000_1010, 0b0001_0001], 11).set(14, true).is_err());
    }

    #[test]
    fn test_failed_set_leaves_bits() {
        let mut bf = raw(&[0xff], 7);
        assert!(bf.set(7, false).is_err());
        assert_eq!(bf.as_bytes(), &[0xff]);
    }

    #[test]
    fn test_swap() {
        let mut bf = raw(&[0b0000_1010], 8);
        assert_eq!(bf.swap(1), Ok(true));
        assert_eq!(bf.as_bytes(), &[0b0100_1010]);

        let mut bf = raw(&[0b0000_1010, 0b0001_0001], 15);
        assert_eq!(bf.swap(11), Ok(false));
        assert_eq!(bf.as_bytes(), &[0b0000_1010, 0b0000_0001]);
    }

    #[test]
    fn test_swap_involution() {
        let original = Bitfield::wrap(vec![0b1011_0010, 0b0110_0000], 11).unwrap();
        for i in 0..11 {
            let mut bf = original.clone();
            bf.swap(i).unwrap();
            assert_ne!(bf, original);
            bf.swap(i).unwrap();
            assert_eq!(bf, original);
        }
    }

    #[test]
    fn test_set_touches_single_bit() {
        let len = 19;
        for i in 0..len {
            let mut bf = Bitfield::new(len).unwrap();
            bf.set(i, true).unwrap();
            for j in 0..len {
                assert_eq!(bf.get(j).unwrap(), i == j);
            }
        }
    }

    #[test]
    fn test_new() {
        assert_eq!(Bitfield::new(64).unwrap().as_bytes().len(), 8);
        assert_eq!(Bitfield::new(65).unwrap().as_bytes().len(), 9);
        assert_eq!(Bitfield::new(0).unwrap_err(), BitfieldError::ZeroLength);
    }

    #[test]
    fn test_wrap() {
        let bytes = b"0123".to_vec();
        assert_eq!(Bitfield::wrap(bytes.clone(), 32).unwrap().as_bytes(), b"0123");
        assert_eq!(Bitfield::wrap(bytes.clone(), 31).unwrap().as_bytes(), b"0123");
        assert_eq!(Bitfield::wrap(bytes.clone(), 25).unwrap().len(), 25);
        // Too long for the buffer.
        assert!(matches!(Bitfield::wrap(bytes.clone(), 33), Err(BitfieldError::LengthMismatch { .. })));
        // Would leave a spare trailing byte.
        assert!(matches!(Bitfield::wrap(bytes.clone(), 24), Err(BitfieldError::LengthMismatch { .. })));
        assert!(Bitfield::wrap(bytes, 23).is_err());
        assert_eq!(Bitfield::wrap(vec![], 0).unwrap_err(), BitfieldError::ZeroLength);
        assert!(Bitfield::wrap(vec![], 1).is_err());
    }

    #[test]
    fn test_fresh_scans() {
        let mut bf = Bitfield::new(21).unwrap();
        assert_eq!(bf.next_false(), (0, false));
        assert_eq!(bf.next_true(), (21, true));
    }

    #[test]
    fn test_next_false() {
        let cases: [(&[u8], usize, usize, (usize, bool)); 6] = [
            (&[0, 0, 0], 24, 0, (0, false)),
            (&[255, 0b1010_1111, 255], 24, 0, (9, false)),
            (&[255], 8, 0, (8, true)),
            (&[255, 255], 16, 0, (16, true)),
            // Padding bits are never reported.
            (&[255, 0b1111_0000], 12, 0, (12, true)),
            // Resume mid-byte, the hit is in the next byte.
            (&[255, 0b0111_0000], 16, 5, (8, false)),
        ];
        for (bytes, len, cursor, want) in cases {
            let mut bf = Bitfield::wrap(bytes.to_vec(), len).unwrap();
            bf.next_false = cursor;
            assert_eq!(bf.next_false(), want, "{:?} len {}", bytes, len);
        }
    }

    #[test]
    fn test_next_true() {
        let cases: [(&[u8], usize, usize, (usize, bool)); 6] = [
            (&[255, 255, 255], 24, 0, (0, false)),
            (&[0, 0b0101_0000, 0], 24, 0, (9, false)),
            (&[0], 8, 0, (8, true)),
            (&[0, 0], 16, 0, (16, true)),
            (&[0, 0], 12, 0, (12, true)),
            (&[0, 0b1000_1111], 16, 5, (8, false)),
        ];
        for (bytes, len, cursor, want) in cases {
            let mut bf = Bitfield::wrap(bytes.to_vec(), len).unwrap();
            bf.next_true = cursor;
            assert_eq!(bf.next_true(), want, "{:?} len {}", bytes, len);
        }
    }

    #[test]
    fn test_mid_byte_resume_checks_rest_of_byte() {
        let mut bf = Bitfield::wrap(vec![0b1111_1011], 8).unwrap();
        bf.next_false = 3;
        assert_eq!(bf.next_false(), (5, false));
    }

    #[test]
    fn test_repeated_scan_is_stable() {
        let mut bf = Bitfield::wrap(vec![255, 0b1111_0111], 16).unwrap();
        assert_eq!(bf.next_false(), (12, false));
        assert_eq!(bf.next_false(), (12, false));
    }

    #[test]
    fn test_set_lowers_next_false() {
        let mut bf = Bitfield::wrap(vec![255, 0b1111_0111], 16).unwrap();
        assert_eq!(bf.next_false(), (12, false));
        bf.set(5, false).unwrap();
        assert_eq!(bf.next_false(), (5, false));
        // A later index leaves the cursor where it is.
        bf.set(6, false).unwrap();
        assert_eq!(bf.next_false(), (5, false));
    }

    #[test]
    fn test_swap_lowers_next_false() {
        let mut bf = Bitfield::wrap(vec![255, 0b1111_0111], 16).unwrap();
        assert_eq!(bf.next_false(), (12, false));
        bf.swap(5).unwrap();
        assert_eq!(bf.next_false(), (5, false));
        bf.swap(6).unwrap();
        assert_eq!(bf.next_false(), (5, false));
    }

    #[test]
    fn test_set_lowers_next_true() {
        let mut bf = Bitfield::new(16).unwrap();
        assert_eq!(bf.next_true(), (16, true));
        bf.set(9, true).unwrap();
        assert_eq!(bf.next_true(), (9, false));
        bf.set(3, true).unwrap();
        assert_eq!(bf.next_true(), (3, false));
        bf.swap(3).unwrap();
        assert_eq!(bf.next_true(), (9, false));
    }

    #[test]
    fn test_sub() {
        let cases: [(&[u8], &[u8], usize, &[u8]); 4] = [
            (&[0], &[0], 8, &[0]),
            (&[0b1111_0000, 0b1010_0000], &[0b1111_0000, 0b1010_0000], 12, &[0, 0]),
            (&[0b1010_1010, 0b1010_0000], &[0b0101_0101, 0b0101_0000], 12, &[0b1010_1010, 0b1010_0000]),
            (&[0b1110_1110, 0b1110_0000], &[0b0100_0100, 0b0100_0000], 12, &[0b1010_1010, 0b1010_0000]),
        ];
        for (a, b, len, want) in cases {
            let a = Bitfield::wrap(a.to_vec(), len).unwrap();
            let b = Bitfield::wrap(b.to_vec(), len).unwrap();
            assert_eq!(a.sub(&b).unwrap().as_bytes(), want);
        }
    }

    #[test]
    fn test_sub_shape_errors() {
        let a = raw(&[0, 0, 0, 0], 32);
        let b = raw(&[0, 0, 0, 0], 31);
        assert!(matches!(a.sub(&b), Err(BitfieldError::UnequalLength { expected: 32, found: 31 })));

        let b = raw(&[0, 0, 0, 0, 0], 32);
        assert!(matches!(a.sub(&b), Err(BitfieldError::UnequalBytes { expected: 4, found: 5 })));
        assert!(matches!(a.equals(&b), Err(BitfieldError::UnequalBytes { .. })));
    }

    #[test]
    fn test_sub_into() {
        let a = Bitfield::wrap(vec![0b1110_1110, 0b1110_0000], 12).unwrap();
        let b = Bitfield::wrap(vec![0b0100_0100, 0b0100_0000], 12).unwrap();
        let mut into = Bitfield::wrap(vec![0xff, 0xf0], 12).unwrap();
        a.sub_into(&mut into, &b).unwrap();
        assert_eq!(into.as_bytes(), &[0b1010_1010, 0b1010_0000]);
        assert_eq!(into.next_true(), (0, false));
        assert_eq!(into.next_false(), (1, false));
    }

    #[test]
    fn test_sub_into_shape_errors() {
        let a = raw(&[0, 0], 12);
        let b = raw(&[0, 0], 12);
        assert!(matches!(a.sub_into(&mut raw(&[0, 0], 11), &b), Err(BitfieldError::UnequalLength { .. })));
        assert!(matches!(a.sub_into(&mut raw(&[0, 0], 12), &raw(&[0, 0], 13)), Err(BitfieldError::UnequalLength { .. })));
        assert!(matches!(a.sub_into(&mut raw(&[0, 0, 0], 12), &b), Err(BitfieldError::UnequalBytes { .. })));
        assert!(matches!(a.sub_into(&mut raw(&[0, 0], 12), &raw(&[0], 12)), Err(BitfieldError::UnequalBytes { .. })));
    }

    #[test]
    fn test_sub_self_is_empty() {
        let mut a = Bitfield::wrap(vec![0b1011_0111, 0b1100_0000], 10).unwrap();
        a.next_false();
        a.next_true();
        let mut diff = a.sub(&a).unwrap();
        assert_eq!(diff.count_ones(), 0);
        assert_eq!(diff.next_true(), (10, true));
        assert_eq!(diff.next_false(), (0, false));
    }

    // Both operands full and fully scanned: the difference is empty, which the
    // seeded false cursor must not hide.
    #[test]
    fn test_sub_full_operands() {
        let mut a = Bitfield::wrap(vec![0xff, 0xc0], 10).unwrap();
        assert_eq!(a.next_false(), (10, true));
        assert_eq!(a.next_true(), (0, false));
        let mut diff = a.sub(&a.clone()).unwrap();
        assert_eq!(diff.next_false(), (0, false));
        assert_eq!(diff.next_true(), (10, true));
    }

    #[test]
    fn test_equals() {
        let a = Bitfield::wrap(vec![0b1010_0000], 3).unwrap();
        let mut b = Bitfield::new(3).unwrap();
        assert_eq!(a.equals(&b), Ok(false));
        b.set(0, true).unwrap();
        b.set(2, true).unwrap();
        assert_eq!(a.equals(&b), Ok(true));
        assert_eq!(a, b);
        assert!(matches!(a.equals(&Bitfield::new(4).unwrap()), Err(BitfieldError::UnequalLength { .. })));
    }

    #[test]
    fn test_count_ones_ignores_padding() {
        let bf = raw(&[0xff, 0xff], 12);
        assert_eq!(bf.count_ones(), 12);
        assert_eq!(bf.into_bytes(), vec![0xff, 0xff]);
    }

    #[test]
    fn test_count_ones_matches_bits() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in 1..40 {
            let bytes: Vec<u8> = (0..(len + 7) / 8).map(|_| rng.gen()).collect();
            let bf = Bitfield::wrap(bytes, len).unwrap();
            let expected = (0..len).filter(|&i| bf.get(i).unwrap()).count();
            assert_eq!(bf.count_ones(), expected, "len {}", len);
        }
        // Whole bytes only, no padding.
        assert_eq!(raw(&[0b1010_0000, 0xff], 16).count_ones(), 10);
    }

    fn naive_next(model: &[bool], want: bool) -> (usize, bool) {
        match model.iter().position(|&b| b == want) {
            Some(i) => (i, false),
            None => (model.len(), true),
        }
    }

    // Random interleavings of mutation and scanning agree with a plain Vec<bool>.
    #[test]
    fn test_random_interleavings() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let len = rng.gen_range(1..70);
            let mut bf = Bitfield::new(len).unwrap();
            let mut model = vec![false; len];
            for _ in 0..300 {
                let i = rng.gen_range(0..len);
                match rng.gen_range(0..5) {
                    0 | 1 => {
                        let v = rng.gen_bool(0.5);
                        bf.set(i, v).unwrap();
                        model[i] = v;
                    },
                    2 => {
                        model[i] = bf.swap(i).unwrap();
                    },
                    3 => assert_eq!(bf.next_false(), naive_next(&model, false)),
                    _ => assert_eq!(bf.next_true(), naive_next(&model, true)),
                }
                assert_eq!(bf.get(i).unwrap(), model[i]);
            }
        }
    }

    #[test]
    fn test_random_sub() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let len = rng.gen_range(1..40);
            let mut a = Bitfield::new(len).unwrap();
            let mut b = Bitfield::new(len).unwrap();
            for i in 0..len {
                a.set(i, rng.gen_bool(0.7)).unwrap();
                b.set(i, rng.gen_bool(0.5)).unwrap();
            }
            // Leave the operands with arbitrary scanned cursors.
            if rng.gen_bool(0.5) { a.next_false(); }
            if rng.gen_bool(0.5) { a.next_true(); }
            if rng.gen_bool(0.5) { b.next_false(); }
            if rng.gen_bool(0.5) { b.next_true(); }

            let mut diff = a.sub(&b).unwrap();
            let model: Vec<bool> = (0..len)
                .map(|i| a.get(i).unwrap() && !b.get(i).unwrap())
                .collect();
            for (i, &want) in model.iter().enumerate() {
                assert_eq!(diff.get(i).unwrap(), want);
            }
            assert_eq!(diff.next_false(), naive_next(&model, false));
            assert_eq!(diff.next_true(), naive_next(&model, true));
        }
    }
}
