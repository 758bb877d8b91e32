use crate::protocol::packet::PacketBuf;

/// Arguments shared by `Z` and `z`.
pub mod breakpoint;

/// Common imports used by the command parsers.
mod prelude {
    pub use core::convert::TryFrom;

    pub use crate::protocol::commands::ParseCommand;
    pub use crate::protocol::common::hex::{decode_bin_buf, decode_hex, decode_hex_buf};
    pub use crate::protocol::common::thread_id::{IdKind, ThreadId};
    pub use crate::protocol::packet::PacketBuf;
}

pub trait ParseCommand<'a>: Sized {
    /// Try to parse a packet from the packet buffer.
    ///
    /// The buffer's body has already had the command name trimmed off.
    fn from_packet(buf: PacketBuf<'a>) -> Option<Self>;
}

/// Command parse error
#[derive(Debug)]
pub enum CommandParseError {
    /// A known command whose payload could not be parsed.
    MalformedCommand(&'static str),
}

macro_rules! commands {
    ($($name:literal => $mod:ident::$command:ident$(<$lifetime:lifetime>)?,)*) => {
        $(
            #[allow(non_snake_case, non_camel_case_types)]
            pub mod $mod;
        )*
        $(pub use $mod::$command;)*

        /// GDB commands
        #[allow(non_camel_case_types)]
        pub enum Command<'a> {
            $($command($command<$($lifetime)?>),)*
            Unknown(&'a [u8]),
        }

        impl<'a> Command<'a> {
            /// Match the body against each command name in turn. First match
            /// wins, so longer names must be listed before their prefixes.
            pub fn from_packet(buf: PacketBuf<'a>) -> Result<Command<'a>, CommandParseError> {
                $(
                    if buf.as_body().starts_with($name.as_bytes()) {
                        let buf = buf.trim_start_body_bytes($name.len());
                        let cmd = $command::from_packet(buf)
                            .ok_or(CommandParseError::MalformedCommand($name))?;
                        return Ok(Command::$command(cmd));
                    }
                )*

                Ok(Command::Unknown(buf.into_body()))
            }
        }
    };
}

commands! {
    "?" => question_mark::QuestionMark,
    "g" => _g::g,
    "G" => _g_upcase::G<'a>,
    "H" => _h_upcase::H,
    "m" => _m::m<'a>,
    "M" => _m_upcase::M<'a>,
    "X" => _x_upcase::X<'a>,
    "z" => _z::z,
    "Z" => _z_upcase::Z,
    "qAttached" => _qAttached::qAttached,
    "qC" => _qC::qC,
    "qfThreadInfo" => _qfThreadInfo::qfThreadInfo,
    "qsThreadInfo" => _qsThreadInfo::qsThreadInfo,
    "qOffsets" => _qOffsets::qOffsets,
    "qSupported" => _qSupported::qSupported<'a>,
    "qSymbol" => _qSymbol::qSymbol,
    "qThreadExtraInfo" => _qThreadExtraInfo::qThreadExtraInfo,
    "qTStatus" => _qTStatus::qTStatus,
    "qXfer:features:read" => _qXfer_features_read::qXferFeaturesRead,

    // Order Matters (because of prefix matching)
    "vCont?" => vCont_question_mark::vContQuestionMark,
    "vCont" => _vCont::vCont<'a>,
    "vKill" => _vKill::vKill,
}

/// Shared parser for commands that take no arguments.
fn parse_empty<T>(buf: PacketBuf<'_>, cmd: T) -> Option<T> {
    if buf.as_body().is_empty() {
        Some(cmd)
    } else {
        None
    }
}
