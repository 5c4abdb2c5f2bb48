use std::{mem::size_of_val, slice};

/// Marker for `#[repr(C)]` types without padding or pointers, whose memory can be handed to the
/// gpu as raw bytes.
///
/// # Safety
/// Implementors must be `#[repr(C)]`, contain no padding bytes and be valid for any bit pattern.
pub unsafe trait Plain: Sized {
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: `Plain` guarantees every byte of `self` is initialised.
        unsafe { slice::from_raw_parts((self as *const Self).cast::<u8>(), size_of_val(self)) }
    }
}

unsafe impl Plain for u8 {}
unsafe impl Plain for u32 {}
unsafe impl Plain for f32 {}
unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

/// Byte view over a run of [Plain] values.
pub trait PlainSlice {
    fn as_bytes(&self) -> &[u8];
}

impl<T: Plain> PlainSlice for [T] {
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: the elements are `Plain`, so the whole contiguous run is initialised bytes.
        unsafe { slice::from_raw_parts(self.as_ptr().cast::<u8>(), size_of_val(self)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_expose_every_byte() {
        let values = [1.0f32, 2.0];
        assert_eq!(PlainSlice::as_bytes(&values[..]).len(), 8);
        assert_eq!(&PlainSlice::as_bytes(&values[..])[..4], &1.0f32.to_ne_bytes());
    }
}
