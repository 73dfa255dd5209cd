//! Slot+generation handle table for objects owned by the C surface.
//!
//! C callers never see a Rust pointer to an allocator, array, or arena;
//! they get a `u64` handle. Released handles carry a stale generation and
//! resolve to `None`, so use-after-release and double release are reported
//! instead of being undefined behaviour.
//!
//! Generations start at 1, which keeps every live handle non-zero and lets
//! `0` serve as the null handle.

/// Handle encoding: upper 32 bits = slot index, lower 32 bits = generation.
fn encode(slot: u32, generation: u32) -> u64 {
    (u64::from(slot) << 32) | u64::from(generation)
}

fn decode(handle: u64) -> (u32, u32) {
    ((handle >> 32) as u32, handle as u32)
}

const FIRST_GENERATION: u32 = 1;

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// Maps `u64` handles to owned values, reusing slots through a free list.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Insert a value and return its (non-zero) handle.
    pub fn insert(&mut self, value: T) -> u64 {
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            encode(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: FIRST_GENERATION,
                data: Some(value),
            });
            encode(slot_idx, FIRST_GENERATION)
        }
    }

    /// Value behind `handle`, or `None` for null, stale, or unknown handles.
    pub fn get(&self, handle: u64) -> Option<&T> {
        let (slot_idx, generation) = decode(handle);
        let slot = self.slots.get(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_ref()
    }

    /// Remove and return the value behind `handle`.
    ///
    /// Bumps the slot's generation. A slot whose generation would wrap back
    /// to zero is retired rather than recycled, so no live handle can ever
    /// collide with the null handle or an earlier epoch.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (slot_idx, generation) = decode(handle);
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        }
        Some(value)
    }

    /// Number of live values.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.data.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_null() {
        let mut table = HandleTable::new();
        let h = table.insert("a");
        assert_ne!(h, 0);
        assert_eq!(table.get(0), None);
        assert_eq!(table.remove(0), None);
        assert_eq!(table.get(h), Some(&"a"));
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut table = HandleTable::new();
        let h = table.insert(7u32);
        assert_eq!(table.remove(h), Some(7));
        assert_eq!(table.get(h), None);
        assert_eq!(table.remove(h), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reused_slot_gets_new_generation() {
        let mut table = HandleTable::new();
        let h1 = table.insert(1u8);
        table.remove(h1);
        let h2 = table.insert(2u8);
        let (slot1, gen1) = decode(h1);
        let (slot2, gen2) = decode(h2);
        assert_eq!(slot1, slot2);
        assert_eq!(gen2, gen1 + 1);
        assert_eq!(table.get(h1), None);
        assert_eq!(table.get(h2), Some(&2));
    }

    #[test]
    fn wrapped_generation_retires_slot() {
        let mut table = HandleTable::new();
        let h = table.insert(1i32);
        table.remove(h);
        table.slots[0].generation = u32::MAX;
        let h_max = table.insert(2i32);
        assert_eq!(decode(h_max), (0, u32::MAX));
        table.remove(h_max);
        assert_eq!(table.slots[0].generation, 0);
        assert!(!table.free_list.contains(&0));
        // Slot 0 at generation 0 would encode as the null handle.
        assert_eq!(table.get(0), None);
        let fresh = table.insert(3i32);
        assert_ne!(decode(fresh).0, 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        #[derive(Clone, Debug)]
        enum Op {
            Insert(u32),
            /// Remove the n-th handle ever issued (modulo the count).
            Remove(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                any::<u32>().prop_map(Op::Insert),
                any::<usize>().prop_map(Op::Remove),
            ]
        }

        proptest! {
            #[test]
            fn table_matches_map_model(ops in proptest::collection::vec(op(), 1..120)) {
                let mut table = HandleTable::new();
                let mut model: HashMap<u64, u32> = HashMap::new();
                let mut issued: Vec<u64> = Vec::new();
                for op in ops {
                    match op {
                        Op::Insert(value) => {
                            let h = table.insert(value);
                            prop_assert_ne!(h, 0);
                            prop_assert!(!model.contains_key(&h));
                            model.insert(h, value);
                            issued.push(h);
                        }
                        Op::Remove(n) if !issued.is_empty() => {
                            let h = issued[n % issued.len()];
                            prop_assert_eq!(table.remove(h), model.remove(&h));
                        }
                        Op::Remove(_) => {}
                    }
                    prop_assert_eq!(table.len(), model.len());
                }
                for h in issued {
                    prop_assert_eq!(table.get(h), model.get(&h));
                }
                prop_assert_eq!(table.get(0), None);
            }
        }
    }
}
