use super::prelude::*;

use crate::protocol::commands::qXferFeaturesRead;

impl<T: Target, C: Connection> GdbStubImpl<T, C> {
    pub(crate) fn handle_target_xml(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
        cmd: qXferFeaturesRead,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let xml = target.target_description_xml().trim().as_bytes();

        let start = cmd.offset.min(xml.len());
        let end = start.saturating_add(cmd.length).min(xml.len());
        let data = &xml[start..end];

        // `l`: last chunk, `m`: more to come
        res.write_str(if end == xml.len() { "l" } else { "m" })?;
        res.write_binary(data)?;
        Ok(HandlerStatus::Handled)
    }
}
