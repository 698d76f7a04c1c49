//! Changed-field encoding for fixed-size parameter blocks.
//!
//! A `Delta` writes a bitmask of the fields that differ from the previous
//! write, followed by only those fields. Snapshots use their own channel
//! header; these types are for host-defined blocks sent alongside them, such
//! as animator or gameplay parameters that change a few fields at a time.

mod fields;
mod value;

pub use fields::{
    Delta, Delta2, Delta4, Delta8, Delta16, DeltaPair, DeltaPair8, DeltaPair16, MAX_ARITY,
    mask_width,
};
pub use value::DeltaValue;
pub(crate) use value::ensure_remaining;
