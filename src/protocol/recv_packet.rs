use managed::ManagedSlice;

use crate::util::managed_vec::{CapacityError, ManagedVec};

pub enum RecvPacketError<C> {
    Capacity,
    Connection(C),
}

impl<C> From<CapacityError<u8>> for RecvPacketError<C> {
    fn from(_: CapacityError<u8>) -> Self {
        RecvPacketError::Capacity
    }
}

/// Receives a packet by pulling data from a callback (typically backed by a
/// blocking `Connection::read`).
///
/// Anything other than `$` is returned as a one-byte packet, which is how
/// acks, nacks and the out-of-band interrupt byte reach the dispatcher.
pub struct RecvPacketBlocking {}

impl RecvPacketBlocking {
    pub fn new() -> Self {
        RecvPacketBlocking {}
    }

    pub fn recv<'b, C>(
        &mut self,
        packet_buffer: &'b mut ManagedSlice<u8>,
        mut get_byte: impl FnMut() -> Result<u8, C>,
    ) -> Result<&'b mut [u8], RecvPacketError<C>> {
        let header_byte = get_byte().map_err(RecvPacketError::Connection)?;

        let mut buf = ManagedVec::new(packet_buffer);
        buf.push(header_byte)?;
        if header_byte == b'$' {
            // read the packet body
            loop {
                let c = get_byte().map_err(RecvPacketError::Connection)?;
                buf.push(c)?;
                if c == b'#' {
                    break;
                }
            }
            // read the checksum as well
            buf.push(get_byte().map_err(RecvPacketError::Connection)?)?;
            buf.push(get_byte().map_err(RecvPacketError::Connection)?)?;
        }

        #[cfg(feature = "trace-pkt")]
        trace!("<-- {}", alloc::string::String::from_utf8_lossy(buf.as_slice()));

        Ok(buf.into_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recv_all(input: &[u8], cap: usize) -> Result<Vec<Vec<u8>>, ()> {
        let mut backing = vec![0; cap];
        let mut packet_buffer = ManagedSlice::Borrowed(&mut backing[..]);
        let mut bytes = input.iter().copied();
        let mut out = Vec::new();
        loop {
            match RecvPacketBlocking::new().recv(&mut packet_buffer, || bytes.next().ok_or(())) {
                Ok(pkt) => out.push(pkt.to_vec()),
                Err(RecvPacketError::Connection(())) => return Ok(out),
                Err(RecvPacketError::Capacity) => return Err(()),
            }
        }
    }

    #[test]
    fn splits_packets_and_single_bytes() {
        let pkts = recv_all(b"+$g#67\x03-$?#3f", 64).unwrap();
        assert_eq!(
            pkts,
            vec![
                b"+".to_vec(),
                b"$g#67".to_vec(),
                vec![0x03],
                b"-".to_vec(),
                b"$?#3f".to_vec()
            ]
        );
    }

    #[test]
    fn oversized_packet() {
        assert!(recv_all(b"$m6800,10#00", 8).is_err());
    }
}
