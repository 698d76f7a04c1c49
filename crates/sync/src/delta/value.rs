use bytes::{Buf, BufMut};
use glam::{Quat, Vec2, Vec3};

use crate::error::CodecError;

/// A fixed-size value that can travel inside a delta container.
///
/// Equality is the type's own `PartialEq`: bit-exact for integers and
/// booleans, exact (epsilon-free) comparison for floats.
pub trait DeltaValue: Copy + PartialEq + Default {
    /// Encoded size in bytes.
    const SIZE: usize;

    fn put<B: BufMut>(&self, out: &mut B);

    /// Reads one value. Callers guarantee `data.remaining() >= Self::SIZE`.
    fn take<B: Buf>(data: &mut B) -> Result<Self, CodecError>;

    fn read_checked<B: Buf>(data: &mut B) -> Result<Self, CodecError> {
        ensure_remaining(data, Self::SIZE)?;
        Self::take(data)
    }
}

pub(crate) fn ensure_remaining<B: Buf>(data: &B, needed: usize) -> Result<(), CodecError> {
    if data.remaining() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: data.remaining(),
        });
    }
    Ok(())
}

macro_rules! impl_delta_value {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl DeltaValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn put<B: BufMut>(&self, out: &mut B) {
                    out.$put(*self);
                }

                #[inline]
                fn take<B: Buf>(data: &mut B) -> Result<Self, CodecError> {
                    Ok(data.$get())
                }
            }
        )*
    };
}

impl_delta_value! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_le, get_u16_le;
    i16 => put_i16_le, get_i16_le;
    u32 => put_u32_le, get_u32_le;
    i32 => put_i32_le, get_i32_le;
    u64 => put_u64_le, get_u64_le;
    i64 => put_i64_le, get_i64_le;
    f32 => put_f32_le, get_f32_le;
    f64 => put_f64_le, get_f64_le;
}

impl DeltaValue for bool {
    const SIZE: usize = 1;

    fn put<B: BufMut>(&self, out: &mut B) {
        out.put_u8(u8::from(*self));
    }

    fn take<B: Buf>(data: &mut B) -> Result<Self, CodecError> {
        match data.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }
}

impl DeltaValue for Vec2 {
    const SIZE: usize = 8;

    fn put<B: BufMut>(&self, out: &mut B) {
        out.put_f32_le(self.x);
        out.put_f32_le(self.y);
    }

    fn take<B: Buf>(data: &mut B) -> Result<Self, CodecError> {
        Ok(Vec2::new(data.get_f32_le(), data.get_f32_le()))
    }
}

impl DeltaValue for Vec3 {
    const SIZE: usize = 12;

    fn put<B: BufMut>(&self, out: &mut B) {
        out.put_f32_le(self.x);
        out.put_f32_le(self.y);
        out.put_f32_le(self.z);
    }

    fn take<B: Buf>(data: &mut B) -> Result<Self, CodecError> {
        Ok(Vec3::new(data.get_f32_le(), data.get_f32_le(), data.get_f32_le()))
    }
}

impl DeltaValue for Quat {
    const SIZE: usize = 16;

    fn put<B: BufMut>(&self, out: &mut B) {
        out.put_f32_le(self.x);
        out.put_f32_le(self.y);
        out.put_f32_le(self.z);
        out.put_f32_le(self.w);
    }

    fn take<B: Buf>(data: &mut B) -> Result<Self, CodecError> {
        Ok(Quat::from_xyzw(
            data.get_f32_le(),
            data.get_f32_le(),
            data.get_f32_le(),
            data.get_f32_le(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_rejects_garbage() {
        let mut data: &[u8] = &[2];
        assert!(matches!(
            bool::read_checked(&mut data),
            Err(CodecError::InvalidBool(2))
        ));
    }

    #[test]
    fn truncated_read_reports_sizes() {
        let mut data: &[u8] = &[0, 0, 0];
        match Vec3::read_checked(&mut data) {
            Err(CodecError::Truncated { needed, remaining }) => {
                assert_eq!(needed, 12);
                assert_eq!(remaining, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn little_endian_layout() {
        let mut out = Vec::new();
        0x0102_u16.put(&mut out);
        assert_eq!(out, vec![0x02, 0x01]);
    }
}
