use managed::ManagedSlice;

/// Error value indicating insufficient capacity.
#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub struct CapacityError<Element>(pub Element);

/// Wraps a ManagedSlice in a fixed-capacity, vec-like interface.
///
/// Owned and borrowed buffers behave the same: the capacity is the length of
/// the slice handed to the builder, which is also what gets advertised to
/// the client as `PacketSize`.
pub struct ManagedVec<'a, 'b, T: 'a> {
    buf: &'b mut ManagedSlice<'a, T>,
    len: usize,
}

impl<'a, 'b, T> ManagedVec<'a, 'b, T> {
    pub fn new(buf: &'b mut ManagedSlice<'a, T>) -> Self {
        ManagedVec { buf, len: 0 }
    }

    pub fn push(&mut self, value: T) -> Result<(), CapacityError<T>> {
        match self.buf.get_mut(self.len) {
            Some(slot) => {
                *slot = value;
                self.len += 1;
                Ok(())
            }
            None => Err(CapacityError(value)),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.buf[..self.len]
    }

    /// Consume the wrapper, returning the filled portion of the buffer.
    pub fn into_slice(self) -> &'b mut [T] {
        let ManagedVec { buf, len } = self;
        &mut buf[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full() {
        let mut backing = [0u8; 3];
        let mut slice = ManagedSlice::Borrowed(&mut backing[..]);
        let mut v = ManagedVec::new(&mut slice);

        assert_eq!(v.push(1), Ok(()));
        assert_eq!(v.push(2), Ok(()));
        assert_eq!(v.push(3), Ok(()));
        assert_eq!(v.push(4), Err(CapacityError(4)));
        assert_eq!(v.as_slice(), &[1, 2, 3]);
        assert_eq!(v.into_slice(), &mut [1, 2, 3]);
    }
}
