use super::prelude::*;

impl<T: Target, C: Connection> GdbStubImpl<T, C> {
    pub(crate) fn handle_section_offsets(
        &mut self,
        res: &mut ResponseWriter<C>,
        target: &mut T,
    ) -> Result<HandlerStatus, Error<T::Error, C::Error>> {
        let offsets = match target.section_offsets().map_err(Error::TargetError)? {
            Some(offsets) => offsets,
            // not relocated: empty reply
            None => return Ok(HandlerStatus::Handled),
        };

        res.write_str("Text=")?;
        res.write_num(offsets.text)?;
        res.write_str(";Data=")?;
        res.write_num(offsets.data)?;
        res.write_str(";Bss=")?;
        res.write_num(offsets.bss)?;
        Ok(HandlerStatus::Handled)
    }
}
