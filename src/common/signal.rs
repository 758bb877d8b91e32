use core::fmt;

/// Signal numbers reported to the GDB client in `S` stop replies.
///
/// Only the signals this debugger can actually produce are named; values
/// follow `include/gdb/signals.def`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub u8);

#[allow(clippy::upper_case_acronyms)]
#[rustfmt::skip]
impl Signal {
    #[doc = "Interrupt"]                 pub const SIGINT:  Self = Self(2);
    #[doc = "Illegal instruction"]       pub const SIGILL:  Self = Self(4);
    #[doc = "Trace/breakpoint trap"]     pub const SIGTRAP: Self = Self(5);
    #[doc = "Arithmetic exception"]      pub const SIGFPE:  Self = Self(8);
    #[doc = "Killed"]                    pub const SIGKILL: Self = Self(9);
    #[doc = "Bus error"]                 pub const SIGBUS:  Self = Self(10);
    #[doc = "Segmentation fault"]        pub const SIGSEGV: Self = Self(11);
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Signal::SIGINT => "SIGINT",
            Signal::SIGILL => "SIGILL",
            Signal::SIGTRAP => "SIGTRAP",
            Signal::SIGFPE => "SIGFPE",
            Signal::SIGKILL => "SIGKILL",
            Signal::SIGBUS => "SIGBUS",
            Signal::SIGSEGV => "SIGSEGV",
            _ => return write!(f, "signal {}", self.0),
        };
        f.write_str(name)
    }
}
