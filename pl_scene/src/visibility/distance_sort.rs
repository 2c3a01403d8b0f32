/// Radix sort of items by distance, shared by the traversal and the
/// transparent draw pass.
///
/// Keys pack the order-preserving bits of the distance in the high half and
/// the item's original position in the low half, so equal distances keep
/// their input order even though the sort itself is unstable.

use rdst::{RadixKey, RadixSort};

#[derive(Debug, Clone, Copy)]
struct DistanceKey {
    key: u64,
    index: u32,
}

impl RadixKey for DistanceKey {
    const LEVELS: usize = 8;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.key >> (level * 8)) as u8
    }
}

/// Map an f32 onto a u32 with the same ordering (NaN sorts last)
#[inline]
fn ordered_bits(value: f32) -> u32 {
    let bits = if value.is_nan() { f32::INFINITY.to_bits() } else { value.to_bits() };
    if bits & 0x8000_0000 != 0 { !bits } else { bits | 0x8000_0000 }
}

/// Positions of `distances` in ascending order (nearest first)
pub(crate) fn front_to_back(distances: &[f32]) -> Vec<usize> {
    sorted_by(distances, ordered_bits)
}

/// Positions of `distances` in descending order (farthest first)
pub(crate) fn back_to_front(distances: &[f32]) -> Vec<usize> {
    sorted_by(distances, |d| !ordered_bits(d))
}

fn sorted_by(distances: &[f32], bits: impl Fn(f32) -> u32) -> Vec<usize> {
    let mut keys: Vec<DistanceKey> = distances
        .iter()
        .enumerate()
        .map(|(index, &d)| DistanceKey {
            key: ((bits(d) as u64) << 32) | index as u64,
            index: index as u32,
        })
        .collect();
    keys.radix_sort_unstable();
    keys.into_iter().map(|k| k.index as usize).collect()
}

#[cfg(test)]
#[path = "distance_sort_tests.rs"]
mod tests;
