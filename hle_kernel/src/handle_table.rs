//! Per-process handle table
//!
//! Maps opaque 32-bit guest handles to kernel objects. Slots are recycled
//! through a free list threaded through the `generations` array; each reuse
//! bumps the slot's generation so stale handles fail validation instead of
//! resolving to the new occupant.
//!
//! The table is a pure slot/generation structure: it is handed the object
//! arena explicitly for reference counting, and the two pseudo-handles
//! (`CURRENT_THREAD`, `CURRENT_PROCESS`) are resolved by the
//! [`Kernel`](crate::Kernel) wrapper, which owns those singletons.

use crate::object::{ObjectId, ObjectTable};
use kernel_types::{Handle, KernelError};

/// Maximum number of slots: handles dedicate 15 bits to the slot index.
pub const MAX_COUNT: usize = 1 << 15;

#[derive(Debug)]
pub struct HandleTable {
    /// Object referenced by each slot, if the slot is in use.
    objects: Vec<Option<ObjectId>>,
    /// Generation of each used slot; for free slots, the index of the next
    /// free slot (the embedded free list).
    generations: Vec<u16>,
    /// Head of the free list.
    next_free_slot: u16,
    /// Generation assigned to the next created handle. Never 0.
    next_generation: u16,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::with_capacity(MAX_COUNT)
    }

    /// A table with fewer slots than the architectural maximum. Exhaustion
    /// behavior is identical; this exists so it can be exercised without
    /// filling 2^15 slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_COUNT);
        let mut table = Self {
            objects: vec![None; capacity],
            generations: vec![0; capacity],
            next_free_slot: 0,
            next_generation: 1,
        };
        table.reset_free_list();
        table
    }

    /// Allocates a new handle for `object`, retaining it in the arena.
    pub fn create(
        &mut self,
        objects: &mut ObjectTable,
        object: ObjectId,
    ) -> Result<Handle, KernelError> {
        let slot = self.next_free_slot as usize;
        if slot >= self.objects.len() {
            log::error!("unable to allocate handle, too many slots in use");
            return Err(KernelError::OutOfHandles);
        }
        self.next_free_slot = self.generations[slot];

        let generation = self.next_generation;
        self.next_generation += 1;
        // Generation 0 is never issued, so wrap straight back to 1.
        if self.next_generation as usize >= MAX_COUNT {
            self.next_generation = 1;
        }

        self.generations[slot] = generation;
        self.objects[slot] = Some(object);
        objects.retain(object);

        Ok(Handle::from_parts(slot as u16, generation))
    }

    /// Issues a second handle to the object an existing handle refers to.
    pub fn duplicate(
        &mut self,
        objects: &mut ObjectTable,
        handle: Handle,
    ) -> Result<Handle, KernelError> {
        let object = self.get(handle).ok_or_else(|| {
            log::error!("tried to duplicate invalid handle: {handle}");
            KernelError::InvalidHandle
        })?;
        self.create(objects, object)
    }

    /// Removes a handle, returning the object id whose strong reference the
    /// caller must now release. The slot goes back on the free list.
    pub fn close(&mut self, handle: Handle) -> Result<ObjectId, KernelError> {
        if !self.is_valid(handle) {
            return Err(KernelError::InvalidHandle);
        }
        let slot = handle.slot() as usize;
        let object = self.objects[slot]
            .take()
            .ok_or(KernelError::InvalidHandle)?;

        self.generations[slot] = self.next_free_slot;
        self.next_free_slot = slot as u16;
        Ok(object)
    }

    /// A handle is valid iff its slot is in range and occupied and the
    /// generation matches the slot's current generation.
    pub fn is_valid(&self, handle: Handle) -> bool {
        let slot = handle.slot() as usize;
        slot < self.objects.len()
            && self.objects[slot].is_some()
            && self.generations[slot] == handle.generation()
    }

    /// Pure table lookup; pseudo-handles are not resolved here.
    pub fn get(&self, handle: Handle) -> Option<ObjectId> {
        if !self.is_valid(handle) {
            return None;
        }
        self.objects[handle.slot() as usize]
    }

    /// Drops every entry for process teardown, returning the object ids the
    /// caller must release. The free list is reset to identity order.
    pub fn clear(&mut self) -> Vec<ObjectId> {
        let released = self.objects.iter_mut().filter_map(Option::take).collect();
        self.reset_free_list();
        released
    }

    /// Number of handles currently issued.
    pub fn count(&self) -> usize {
        self.objects.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.objects.len()
    }

    fn reset_free_list(&mut self) {
        for (slot, generation) in self.generations.iter_mut().enumerate() {
            *generation = slot as u16 + 1;
        }
        self.next_free_slot = 0;
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
