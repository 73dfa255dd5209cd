//! Workload builders shared by the dsmem benchmarks.
//!
//! - [`filled_array`]: an array pre-populated with `n` sequential values
//! - [`request_sizes`]: a deterministic mix of small arena request sizes

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use dsmem_array::DynArray;
use dsmem_core::{Allocator, MemError};

/// An array holding `0..n` in order.
pub fn filled_array(allocator: Arc<Allocator>, n: usize) -> Result<DynArray<usize>, MemError> {
    let array = DynArray::new(allocator)?;
    for value in 0..n {
        array.add_item(value)?;
    }
    Ok(array)
}

/// `count` request sizes in `1..=max`, from a fixed linear congruential
/// sequence so every run sees the same mix.
pub fn request_sizes(count: usize, max: usize) -> Vec<usize> {
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as usize % max + 1
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sizes_are_deterministic_and_bounded() {
        let a = request_sizes(256, 64);
        assert_eq!(a, request_sizes(256, 64));
        assert!(a.iter().all(|&s| (1..=64).contains(&s)));
    }

    #[test]
    fn filled_array_is_sequential() {
        let array = filled_array(Arc::new(Allocator::new()), 10).unwrap();
        assert_eq!(array.to_vec().unwrap(), (0..10).collect::<Vec<_>>());
    }
}
