use bytes::{Buf, BufMut};

use super::value::{DeltaValue, ensure_remaining};
use crate::error::CodecError;

pub const MAX_ARITY: usize = 16;

/// Width of the mask written in front of the changed fields.
#[inline]
pub const fn mask_width(arity: usize) -> usize {
    if arity <= 8 { 1 } else { 2 }
}

fn put_mask<B: BufMut>(mask: u16, arity: usize, out: &mut B) {
    if mask_width(arity) == 1 {
        out.put_u8(mask as u8);
    } else {
        out.put_u16_le(mask);
    }
}

fn take_mask<B: Buf>(arity: usize, data: &mut B) -> Result<u16, CodecError> {
    let width = mask_width(arity);
    ensure_remaining(data, width)?;
    let mask = if width == 1 {
        u16::from(data.get_u8())
    } else {
        data.get_u16_le()
    };

    if arity < MAX_ARITY && mask >> arity != 0 {
        return Err(CodecError::MaskOutOfRange { mask, arity });
    }
    Ok(mask)
}

/// N values of one type, encoded as a changed-field mask followed by the
/// changed values in ascending bit order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta<T: DeltaValue, const N: usize> {
    pub fields: [T; N],
}

pub type Delta2<T> = Delta<T, 2>;
pub type Delta4<T> = Delta<T, 4>;
pub type Delta8<T> = Delta<T, 8>;
pub type Delta16<T> = Delta<T, 16>;

impl<T: DeltaValue, const N: usize> Default for Delta<T, N> {
    fn default() -> Self {
        Self::new([T::default(); N])
    }
}

impl<T: DeltaValue, const N: usize> Delta<T, N> {
    const ARITY_OK: () = assert!(N >= 1 && N <= MAX_ARITY, "delta arity must be 1..=16");

    pub fn new(fields: [T; N]) -> Self {
        let () = Self::ARITY_OK;
        Self { fields }
    }

    pub fn changed_mask(&self, last: &Self) -> u16 {
        self.fields
            .iter()
            .zip(last.fields.iter())
            .enumerate()
            .filter(|(_, (current, previous))| current != previous)
            .fold(0u16, |mask, (i, _)| mask | (1 << i))
    }

    /// Writes the mask and every changed field, then records `self` as the
    /// new `last`, whether or not anything changed. Returns whether any field
    /// changed.
    pub fn write<B: BufMut>(&self, last: &mut Self, out: &mut B) -> bool {
        let () = Self::ARITY_OK;
        let mask = self.changed_mask(last);
        put_mask(mask, N, out);

        for (i, field) in self.fields.iter().enumerate() {
            if mask & (1 << i) != 0 {
                field.put(out);
            }
        }

        *last = *self;
        mask != 0
    }

    /// Rebuilds a full value from a partial update, taking unset fields from
    /// `last`. `last` is updated to the result.
    pub fn read<B: Buf>(last: &mut Self, data: &mut B) -> Result<Self, CodecError> {
        let () = Self::ARITY_OK;
        let mask = take_mask(N, data)?;
        let mut result = *last;

        for (i, field) in result.fields.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *field = T::read_checked(data)?;
            }
        }

        *last = result;
        Ok(result)
    }
}

/// Two field groups of different types sharing one mask. Bits `0..NA` cover
/// the `A` group, bits `NA..NA + NB` the `B` group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaPair<A: DeltaValue, B: DeltaValue, const NA: usize, const NB: usize> {
    pub first: [A; NA],
    pub second: [B; NB],
}

pub type DeltaPair8<A, B> = DeltaPair<A, B, 4, 4>;
pub type DeltaPair16<A, B> = DeltaPair<A, B, 8, 8>;

impl<A: DeltaValue, B: DeltaValue, const NA: usize, const NB: usize> Default
    for DeltaPair<A, B, NA, NB>
{
    fn default() -> Self {
        Self::new([A::default(); NA], [B::default(); NB])
    }
}

impl<A: DeltaValue, B: DeltaValue, const NA: usize, const NB: usize> DeltaPair<A, B, NA, NB> {
    const ARITY_OK: () = assert!(
        NA >= 1 && NB >= 1 && NA + NB <= MAX_ARITY,
        "delta pair arity must be 2..=16"
    );

    pub fn new(first: [A; NA], second: [B; NB]) -> Self {
        let () = Self::ARITY_OK;
        Self { first, second }
    }

    pub const fn arity() -> usize {
        NA + NB
    }

    pub fn changed_mask(&self, last: &Self) -> u16 {
        let mut mask = 0u16;
        for (i, (current, previous)) in self.first.iter().zip(last.first.iter()).enumerate() {
            if current != previous {
                mask |= 1 << i;
            }
        }
        for (i, (current, previous)) in self.second.iter().zip(last.second.iter()).enumerate() {
            if current != previous {
                mask |= 1 << (NA + i);
            }
        }
        mask
    }

    pub fn write<W: BufMut>(&self, last: &mut Self, out: &mut W) -> bool {
        let () = Self::ARITY_OK;
        let mask = self.changed_mask(last);
        put_mask(mask, Self::arity(), out);

        for (i, field) in self.first.iter().enumerate() {
            if mask & (1 << i) != 0 {
                field.put(out);
            }
        }
        for (i, field) in self.second.iter().enumerate() {
            if mask & (1 << (NA + i)) != 0 {
                field.put(out);
            }
        }

        *last = *self;
        mask != 0
    }

    pub fn read<R: Buf>(last: &mut Self, data: &mut R) -> Result<Self, CodecError> {
        let () = Self::ARITY_OK;
        let mask = take_mask(Self::arity(), data)?;
        let mut result = *last;

        for (i, field) in result.first.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *field = A::read_checked(data)?;
            }
        }
        for (i, field) in result.second.iter_mut().enumerate() {
            if mask & (1 << (NA + i)) != 0 {
                *field = B::read_checked(data)?;
            }
        }

        *last = result;
        Ok(result)
    }
}
