use num_traits::{CheckedAdd, CheckedMul, FromPrimitive, Zero};

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeHexError {
    NotAscii,
    Empty,
    Overflow,
    InvalidOutput,
}

/// Decode a GDB hex string into the specified integer.
///
/// GDB hex strings may include "xx", which represent "missing" data. This
/// method simply treats "xx" as 0x00.
pub fn decode_hex<I>(buf: &[u8]) -> Result<I, DecodeHexError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    use DecodeHexError::*;

    let radix = I::from_u8(16).ok_or(InvalidOutput)?;

    if buf.is_empty() {
        return Err(Empty);
    }

    let mut result = I::zero();

    for &digit in buf {
        let x = I::from_u8(ascii2byte(digit).ok_or(NotAscii)?).ok_or(InvalidOutput)?;
        result = result.checked_mul(&radix).ok_or(Overflow)?;
        result = result.checked_add(&x).ok_or(Overflow)?
    }

    Ok(result)
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeHexBufError {
    NotAscii,
}

fn ascii2byte(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'x' | b'X' => Some(0),
        _ => None,
    }
}

/// Decode a GDB hex string into a byte slice _in place_.
///
/// An odd-length string is treated as if it had a leading `0`.
pub fn decode_hex_buf(base_buf: &mut [u8]) -> Result<&mut [u8], DecodeHexBufError> {
    use DecodeHexBufError::*;

    let odd_adjust = base_buf.len() % 2;
    if odd_adjust != 0 {
        base_buf[0] = ascii2byte(base_buf[0]).ok_or(NotAscii)?;
    }
    let buf = &mut base_buf[odd_adjust..];

    let decoded_len = buf.len() / 2;
    for i in 0..decoded_len {
        let b = ascii2byte(buf[i * 2]).ok_or(NotAscii)? << 4
            | ascii2byte(buf[i * 2 + 1]).ok_or(NotAscii)?;
        buf[i] = b;
    }

    Ok(&mut base_buf[..decoded_len + odd_adjust])
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeBinBufError {
    UnexpectedEnd,
}

/// Decode GDB escaped binary bytes into a byte slice _in place_.
///
/// `}` introduces an escape: the byte that follows is XOR'd with `0x20`.
pub fn decode_bin_buf(buf: &mut [u8]) -> Result<&mut [u8], DecodeBinBufError> {
    use DecodeBinBufError::*;

    let mut i = 0;
    let mut j = 0;
    let len = buf.len();
    while i < len && j < len {
        if buf[j] == b'}' {
            if j + 1 >= len {
                return Err(UnexpectedEnd);
            }
            buf[i] = buf[j + 1] ^ 0x20;
            j += 2;
        } else {
            buf[i] = buf[j];
            j += 1;
        }
        i += 1;
    }

    Ok(&mut buf[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_hex_simple() {
        assert_eq!(decode_hex::<u32>(b"6800"), Ok(0x6800));
        assert_eq!(decode_hex::<u32>(b"ffffffff"), Ok(0xffff_ffff));
        assert_eq!(decode_hex::<u32>(b"100000000"), Err(DecodeHexError::Overflow));
        assert_eq!(decode_hex::<u32>(b""), Err(DecodeHexError::Empty));
        assert_eq!(decode_hex::<u8>(b"g0"), Err(DecodeHexError::NotAscii));
    }

    #[test]
    fn decode_hex_buf_odd() {
        let mut payload = b"ffffff4".to_vec();
        let res = decode_hex_buf(&mut payload).unwrap();
        assert_eq!(res, [0xf, 0xff, 0xff, 0xf4]);
    }

    #[test]
    fn decode_hex_buf_missing_data() {
        let mut payload = b"4exx".to_vec();
        let res = decode_hex_buf(&mut payload).unwrap();
        assert_eq!(res, [0x4e, 0x00]);
    }

    #[test]
    fn decode_bin_buf_unescapes() {
        let mut payload = b"a}\x03}\x04}]}\x0az".to_vec();
        let res = decode_bin_buf(&mut payload).unwrap();
        assert_eq!(res, b"a#$}*z");
    }

    #[test]
    fn decode_bin_buf_trailing_escape() {
        let mut payload = b"ab}".to_vec();
        assert_eq!(
            decode_bin_buf(&mut payload).map(|b| b.to_vec()),
            Err(DecodeBinBufError::UnexpectedEnd)
        );
    }
}
