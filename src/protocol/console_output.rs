use core::fmt;

use alloc::vec::Vec;

/// Text for the client's console, sent as one `O` packet ahead of a stop
/// reply.
///
/// A target gets one of these after every stop, through
/// [`Target::report_console_output`](crate::target::Target::report_console_output),
/// and writes whatever the user should see about the stop into it, such as
/// the access that caused a bus error. Each line written with
/// [`outputln!`](crate::outputln) goes out as its own packet.
pub struct ConsoleOutput<'a> {
    line: Vec<u8>,
    send: &'a mut dyn FnMut(&[u8]),
}

impl fmt::Write for ConsoleOutput<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.line.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl<'a> ConsoleOutput<'a> {
    pub(crate) fn new(send: &'a mut dyn FnMut(&[u8])) -> ConsoleOutput<'a> {
        ConsoleOutput {
            line: Vec::new(),
            send,
        }
    }

    /// Send whatever has been written since the last packet.
    pub fn end_line(&mut self) {
        if !self.line.is_empty() {
            (self.send)(&self.line);
            self.line.clear();
        }
    }
}

impl Drop for ConsoleOutput<'_> {
    fn drop(&mut self) {
        self.end_line()
    }
}

/// Write a line to a [`ConsoleOutput`] and send it.
#[macro_export]
macro_rules! outputln {
    ($console_output:expr, $($args:tt)*) => {{
        use core::fmt::Write;
        let _ = writeln!($console_output, $($args)*);
        $console_output.end_line();
    }};
}
