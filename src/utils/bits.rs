use crate::error::{Result, RtspError};

/// A bit-level reader for parsing binary data streams.
///
/// Implements the H.264/H.265 style bit reading operations the codec
/// parsers need:
/// - Reading individual bits
/// - Reading multiple bits as numbers (MSB-first)
/// - Reading exponential Golomb codes (ue(v))
/// - Reading signed exponential Golomb codes (se(v))
///
/// The reader never reads past the supplied slice; running out of bits is
/// a recoverable [`RtspError::Parse`], not a panic.
///
/// Example:
/// ```
/// use rtspio::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader over a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit. Returns true for 1, false for 0.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(RtspError::Parse("bit reader reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits (n <= 32) as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(RtspError::Parse("too many bits requested".into()));
        }

        let mut value = 0u32;
        let n = n as usize;

        for i in 0..n {
            if self.read_bit()? {
                value |= 1 << (n - 1 - i);
            }
        }

        Ok(value)
    }

    /// Reads n bits (n <= 64) as a big-endian number. Needed for the
    /// 48-bit constraint-indicator field of the H.265 profile-tier-level
    /// block.
    pub fn read_bits_64(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(RtspError::Parse("too many bits requested".into()));
        }

        let mut value = 0u64;
        let n = n as usize;

        for i in 0..n {
            if self.read_bit()? {
                value |= 1 << (n - 1 - i);
            }
        }

        Ok(value)
    }

    /// Reads an unsigned exponential Golomb code (ue(v)).
    ///
    /// Count M leading zeros up to the first 1, read M more INFO bits,
    /// value = 2^M + INFO - 1.
    pub fn read_golomb(&mut self) -> Result<u32> {
        let mut leading_zeros = 0;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(RtspError::Parse("invalid exp-Golomb code".into()));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let info = self.read_bits(leading_zeros)?;
        Ok((1u32 << leading_zeros) + info - 1)
    }

    /// Reads a signed exponential Golomb code (se(v)).
    ///
    /// k=0 maps to 0; otherwise magnitude = (k+1)>>1 with the sign taken
    /// from the parity of k (odd positive, even negative).
    pub fn read_signed_golomb(&mut self) -> Result<i32> {
        let k = self.read_golomb()?;
        if k == 0 {
            return Ok(0);
        }

        let magnitude = ((k + 1) >> 1) as i32;
        let sign = if k & 1 == 1 { 1 } else { -1 };
        Ok(sign * magnitude)
    }

    /// Skips n bits.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.read_bit()?;
        }
        Ok(())
    }

    /// Returns the number of bits left to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }
}

/// A bit-level writer, the counterpart of [`BitReader`].
///
/// Used by the MPEG-4 AudioSpecificConfig serializer, which must emit
/// escape-coded fields that are not byte aligned.
pub struct BitWriter {
    out: Vec<u8>,
    bit_offset: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter {
            out: Vec::new(),
            bit_offset: 0,
        }
    }

    /// Writes the low n bits (n <= 32) of `value`, MSB-first.
    pub fn write_bits(&mut self, value: u32, n: u32) -> Result<()> {
        if n > 32 {
            return Err(RtspError::Parse("too many bits written".into()));
        }

        for i in (0..n).rev() {
            let bit = (value >> i) & 1;
            if self.bit_offset == 0 {
                self.out.push(0);
            }
            if bit == 1 {
                let last = self.out.len() - 1;
                self.out[last] |= 1 << (7 - self.bit_offset);
            }
            self.bit_offset = (self.bit_offset + 1) % 8;
        }

        Ok(())
    }

    /// Pads the current byte with zero bits and returns the written bytes.
    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test_utils {
    /// Encodes a single value as an exp-Golomb code.
    pub fn encode_golomb(value: u32) -> Vec<u8> {
        if value == 0 {
            return vec![0b10000000];
        }

        let leading_zeros = 32 - (value + 1).leading_zeros() - 1;
        let info = value - ((1u32 << leading_zeros) - 1);

        let total_bits = (leading_zeros as usize) * 2 + 1;
        let total_bytes = total_bits.div_ceil(8);
        let mut result = vec![0u8; total_bytes];

        let mut bit_pos: usize = leading_zeros as usize;

        result[bit_pos / 8] |= 1 << (7 - (bit_pos % 8));
        bit_pos += 1;

        for i in 0..leading_zeros as usize {
            let bit = (info >> (leading_zeros - 1 - i as u32)) & 1;
            if bit == 1 {
                result[bit_pos / 8] |= 1 << (7 - (bit_pos % 8));
            }
            bit_pos += 1;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        let data = [0b10110011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10011);

        // Cross-byte boundary
        let data = [0b10110011, 0b01011010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(8).unwrap(), 0b10011010);

        // Zero-width read
        let data = [0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(0).unwrap(), 0);

        // Width limit
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_bits(33).is_err());
    }

    #[test]
    fn test_read_bits_64() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits_64(48).unwrap(), 0x010203040506);

        let mut reader = BitReader::new(&data);
        assert!(reader.read_bits_64(64).is_err());
    }

    #[test]
    fn test_read_golomb() {
        let test_cases = [
            ([0b10000000], 0),
            ([0b01000000], 1),
            ([0b01100000], 2),
            ([0b00100000], 3),
            ([0b00101000], 4),
            ([0b00110000], 5),
            ([0b00111000], 6),
            ([0b00010000], 7),
            ([0b00010010], 8),
        ];

        for (input, expected) in test_cases {
            let mut reader = BitReader::new(&input);
            assert_eq!(reader.read_golomb().unwrap(), expected);

            let encoded = encode_golomb(expected);
            assert_eq!(&encoded[..1], &input, "encoding {} gave wrong bits", expected);
        }

        // All zeros never terminates within the width limit.
        let data = [0x00; 5];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_golomb().is_err());
    }

    #[test]
    fn test_signed_golomb() {
        let test_cases = [
            ([0b10000000], 0),
            ([0b01000000], 1),
            ([0b01100000], -1),
            ([0b00100000], 2),
            ([0b00101000], 2),
            ([0b00110000], -3),
            ([0b00111000], -3),
            ([0b00010000], 4),
            ([0b00010010], -4),
        ];

        for (input, expected) in test_cases {
            let mut reader = BitReader::new(&input);
            assert_eq!(reader.read_signed_golomb().unwrap(), expected);
        }
    }

    #[test]
    fn test_end_of_data_is_error_not_panic() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        reader.read_bits(8).unwrap();
        assert!(reader.read_bit().is_err());
        assert_eq!(reader.available_bits(), 0);
    }

    #[test]
    fn test_bit_writer_round_trip() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b10110, 5).unwrap();
        writer.write_bits(0b0011, 4).unwrap();
        writer.write_bits(0x1FF, 9).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10110);
        assert_eq!(reader.read_bits(4).unwrap(), 0b0011);
        assert_eq!(reader.read_bits(9).unwrap(), 0x1FF);
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        if data.is_empty() {
            return true;
        }

        let n = n % 33;
        let mut reader = BitReader::new(&data);
        match reader.read_bits(n as u32) {
            Ok(result) => {
                let mut expected = 0u32;
                for i in 0..n as usize {
                    let byte_idx = i / 8;
                    let bit_idx = 7 - (i % 8);
                    if byte_idx >= data.len() {
                        return true;
                    }
                    let bit = (data[byte_idx] >> bit_idx) & 1;
                    expected |= (bit as u32) << (n as usize - 1 - i);
                }
                result == expected
            }
            Err(_) => true,
        }
    }

    #[quickcheck]
    fn prop_writer_reader_round_trip(values: Vec<(u32, u8)>) -> bool {
        let values: Vec<(u32, u32)> = values
            .into_iter()
            .map(|(v, n)| {
                let n = (n % 32) as u32 + 1;
                (v & ((1u64 << n) - 1) as u32, n)
            })
            .collect();

        let mut writer = BitWriter::new();
        for &(v, n) in &values {
            writer.write_bits(v, n).unwrap();
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        values
            .iter()
            .all(|&(v, n)| reader.read_bits(n).map(|r| r == v).unwrap_or(false))
    }
}
