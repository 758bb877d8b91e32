use crate::protocol::commands::{Command, CommandParseError};
use crate::protocol::common::hex::decode_hex;

/// Packet parse error.
#[derive(Debug)]
pub enum PacketParseError {
    /// Checksum in the trailer does not match the body.
    ChecksumMismatched {
        /// Checksum sent by the client.
        checksum: u8,
        /// Checksum computed over the received body.
        calculated: u8,
    },
    /// Zero-length packet.
    EmptyBuf,
    /// No `#` trailer.
    MissingChecksum,
    /// Trailer is not two hex digits.
    MalformedChecksum,
    /// Known command with an unparsable payload.
    MalformedCommand,
    /// First byte is not `$`, `+`, `-` or the interrupt byte.
    UnexpectedHeader(u8),
}

impl PacketParseError {
    /// Errors caused by line noise, which the client recovers from by
    /// retransmitting after a NACK.
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self,
            PacketParseError::ChecksumMismatched { .. }
                | PacketParseError::MissingChecksum
                | PacketParseError::MalformedChecksum
        )
    }
}

impl From<CommandParseError> for PacketParseError {
    fn from(_: CommandParseError) -> Self {
        PacketParseError::MalformedCommand
    }
}

/// Top-Level GDB packet
pub enum Packet<'a> {
    Ack,
    Nack,
    Interrupt,
    Command(Command<'a>),
}

/// A validated `$<body>#cc` packet, with the body range tracked separately
/// from the backing buffer so command parsers can reuse the whole buffer as
/// scratch space.
pub struct PacketBuf<'a> {
    buf: &'a mut [u8],
    body_range: core::ops::Range<usize>,
}

impl<'a> PacketBuf<'a> {
    /// Validate the contents of the raw packet buffer, checking for checksum
    /// consistency and structural correctness.
    ///
    /// The body is not required to be ASCII, as `X` packets carry raw binary.
    pub fn new(pkt_buf: &'a mut [u8]) -> Result<PacketBuf<'a>, PacketParseError> {
        if pkt_buf.is_empty() {
            return Err(PacketParseError::EmptyBuf);
        }

        let end_of_body = match pkt_buf.iter().rposition(|b| *b == b'#') {
            Some(i) if i >= 1 => i,
            _ => return Err(PacketParseError::MissingChecksum),
        };

        let checksum = pkt_buf
            .get(end_of_body + 1..end_of_body + 3)
            .ok_or(PacketParseError::MalformedChecksum)?;
        let checksum = decode_hex(checksum).map_err(|_| PacketParseError::MalformedChecksum)?;

        let calculated = checksum_of(&pkt_buf[1..end_of_body]);
        if calculated != checksum {
            return Err(PacketParseError::ChecksumMismatched {
                checksum,
                calculated,
            });
        }

        Ok(PacketBuf {
            buf: pkt_buf,
            body_range: 1..end_of_body,
        })
    }

    /// (used for tests) Create a packet buffer from a raw body buffer,
    /// skipping the header/checksum trimming stage.
    #[cfg(test)]
    pub fn new_with_raw_body(body: &'a mut [u8]) -> PacketBuf<'a> {
        let len = body.len();
        PacketBuf {
            buf: body,
            body_range: 0..len,
        }
    }

    pub fn trim_start_body_bytes(self, n: usize) -> Self {
        PacketBuf {
            buf: self.buf,
            body_range: (self.body_range.start + n)..self.body_range.end,
        }
    }

    pub fn as_body(&self) -> &[u8] {
        &self.buf[self.body_range.clone()]
    }

    /// Return a mut reference to slice of the packet buffer corresponding to
    /// the current body.
    pub fn into_body(self) -> &'a mut [u8] {
        &mut self.buf[self.body_range]
    }

    /// Return a mut reference to the _entire_ underlying packet buffer, and
    /// the current body's range.
    pub fn into_raw_buf(self) -> (&'a mut [u8], core::ops::Range<usize>) {
        (self.buf, self.body_range)
    }
}

/// The protocol checksum: sum of all payload bytes, modulo 256.
pub fn checksum_of(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |a, x| a.wrapping_add(*x))
}

impl<'a> Packet<'a> {
    pub fn from_buf(buf: &'a mut [u8]) -> Result<Packet<'a>, PacketParseError> {
        // cannot have empty packet
        if buf.is_empty() {
            return Err(PacketParseError::EmptyBuf);
        }

        match buf[0] {
            b'$' => Ok(Packet::Command(Command::from_packet(PacketBuf::new(buf)?)?)),
            b'+' => Ok(Packet::Ack),
            b'-' => Ok(Packet::Nack),
            0x03 => Ok(Packet::Interrupt),
            _ => Err(PacketParseError::UnexpectedHeader(buf[0])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut v = vec![b'$'];
        v.extend_from_slice(body);
        v.extend_from_slice(format!("#{:02x}", checksum_of(body)).as_bytes());
        v
    }

    #[test]
    fn checksum_known_values() {
        assert_eq!(checksum_of(b""), 0x00);
        assert_eq!(checksum_of(b"OK"), 0x9a);
        assert_eq!(checksum_of(b"S05"), 0xb8);
        assert_eq!(checksum_of(b"vCont;s"), 0xb8);
    }

    #[test]
    fn valid_packet_body() {
        let mut buf = frame(b"m6800,4");
        let pkt = PacketBuf::new(&mut buf).unwrap();
        assert_eq!(pkt.as_body(), b"m6800,4");
    }

    #[test]
    fn body_may_contain_binary() {
        let mut buf = frame(b"X0,2:\x4e\x49");
        let pkt = PacketBuf::new(&mut buf).unwrap();
        assert_eq!(pkt.as_body(), b"X0,2:\x4e\x49");
    }

    #[test]
    fn corrupted_byte_fails_checksum() {
        let good = frame(b"qSupported:multiprocess+");
        for i in 1..good.len() - 3 {
            let mut bad = good.clone();
            bad[i] = bad[i].wrapping_add(1);
            if bad[i] == b'#' {
                continue;
            }
            assert!(
                matches!(
                    PacketBuf::new(&mut bad),
                    Err(PacketParseError::ChecksumMismatched { .. })
                ),
                "corruption at {} went unnoticed",
                i
            );
        }
    }

    #[test]
    fn missing_or_short_checksum() {
        let mut buf = b"$g".to_vec();
        assert!(matches!(
            PacketBuf::new(&mut buf),
            Err(PacketParseError::MissingChecksum)
        ));

        let mut buf = b"$g#6".to_vec();
        assert!(matches!(
            PacketBuf::new(&mut buf),
            Err(PacketParseError::MalformedChecksum)
        ));
    }

    #[test]
    fn single_byte_packets() {
        assert!(matches!(Packet::from_buf(&mut [b'+']), Ok(Packet::Ack)));
        assert!(matches!(Packet::from_buf(&mut [b'-']), Ok(Packet::Nack)));
        assert!(matches!(Packet::from_buf(&mut [0x03]), Ok(Packet::Interrupt)));
        assert!(matches!(
            Packet::from_buf(&mut [b'z']),
            Err(PacketParseError::UnexpectedHeader(b'z'))
        ));
    }
}
