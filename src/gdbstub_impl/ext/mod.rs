mod prelude {
    pub use crate::common::*;
    pub use crate::connection::Connection;
    pub use crate::target::Target;

    pub(crate) use crate::protocol::ResponseWriter;

    pub(super) use super::super::error::GdbStubError as Error;
    pub(super) use super::super::target_result_ext::TargetResultExt;
    pub(super) use super::super::{DisconnectReason, GdbStubImpl, HandlerStatus, EINVAL};
}

mod base;
mod breakpoints;
mod resume;
mod section_offsets;
mod target_xml;
