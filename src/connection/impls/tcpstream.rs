use std::io::{Read, Write};
use std::net::TcpStream;

use crate::Connection;

impl Connection for TcpStream {
    type Error = std::io::Error;

    fn read(&mut self) -> Result<u8, Self::Error> {
        self.set_nonblocking(false)?;

        let mut buf = [0u8];
        Read::read_exact(self, &mut buf)?;
        Ok(buf[0])
    }

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        Write::write_all(self, &[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        Write::write_all(self, buf)
    }

    fn peek(&mut self) -> Result<Option<u8>, Self::Error> {
        self.set_nonblocking(true)?;

        let mut buf = [0u8];
        let res = match TcpStream::peek(self, &mut buf) {
            Ok(0) => Err(std::io::ErrorKind::UnexpectedEof.into()),
            Ok(_) => Ok(Some(buf[0])),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        };

        self.set_nonblocking(false)?;
        res
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Write::flush(self)
    }

    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        // packets are tiny and latency sensitive
        self.set_nodelay(true)
    }
}
