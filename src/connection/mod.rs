mod impls;

/// Bytewise I/O over the serial link (or socket) the GDB client talks on.
///
/// When the `std` feature is enabled, this trait is implemented for
/// [`TcpStream`](std::net::TcpStream).
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// Read a single byte, blocking until one arrives.
    fn read(&mut self) -> Result<u8, Self::Error>;

    /// Write a single byte.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Write an entire buffer.
    ///
    /// The default implementation calls `self.write()` for each byte.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        buf.iter().try_for_each(|b| self.write(*b))
    }

    /// Peek a single byte without consuming it. This must be
    /// **non-blocking**, returning `None` if no byte is available.
    ///
    /// The engine polls this while the target runs to spot the interrupt
    /// byte (`0x03`).
    fn peek(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Flush buffered output, if any.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once at the start of a debugging session.
    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
