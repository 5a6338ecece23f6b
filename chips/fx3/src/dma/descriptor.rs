// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! DMA descriptors and the descriptor pool.
//!
//! All sockets share one flat table of [`DESCRIPTOR_COUNT`] descriptors in
//! system RAM. A descriptor names one buffer and links to the next
//! descriptor a socket should move to, separately for the write (producer)
//! and the read (consumer) side.
//!
//! Slot ownership is tracked by [`DescriptorPool`], a bitmap with one bit per
//! slot. Slot 0 is used by the boot ROM and is never handed out.
//!
//! The pool does not detect double frees: freeing a slot that is already
//! free still increments the available count. Callers own their slots.

use core::cell::RefCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use critical_section::Mutex;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::{ErrorCode, StaticRef};

/// Number of descriptors in the descriptor region.
pub const DESCRIPTOR_COUNT: usize = 256;

/// Address of the descriptor region.
pub const DESCRIPTOR_TABLE_BASE: usize = 0x4000_0000;

/// Mask applied to buffer sizes before they are stored in a descriptor.
pub const BUFFER_SIZE_MASK: u32 = 0x0000_FFF0;

const BITMAP_WORDS: usize = DESCRIPTOR_COUNT / 32;

register_bitfields![u32,
    pub DSCR_SIZE [
        /// Buffer is the last one of a marked sequence
        MARKER OFFSET(0) NUMBITS(1) [],
        /// Buffer holds data that has not been consumed yet
        BUFFER_OCCUPIED OFFSET(1) NUMBITS(1) [],
        /// Producer reported an error while filling the buffer
        BUFFER_ERROR OFFSET(2) NUMBITS(1) [],
        /// Buffer ends a packet
        EOP OFFSET(3) NUMBITS(1) [],
        /// Buffer capacity in 16 byte units
        BUFFER_SIZE OFFSET(4) NUMBITS(12) [],
        /// Number of valid bytes in the buffer
        BYTE_COUNT OFFSET(16) NUMBITS(16) []
    ],
    pub DSCR_CHAIN [
        /// Next descriptor for the consumer (read) side
        RD_NEXT_DSCR OFFSET(0) NUMBITS(16) [],
        /// Next descriptor for the producer (write) side
        WR_NEXT_DSCR OFFSET(16) NUMBITS(16) []
    ]
];

/// Which of the two next pointers to follow when walking a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainDirection {
    /// Follow `WR_NEXT_DSCR`, the link the producer socket uses.
    Producer,
    /// Follow `RD_NEXT_DSCR`, the link the consumer socket uses.
    Consumer,
}

/// One descriptor as laid out in the descriptor region.
#[repr(C)]
pub struct Descriptor {
    buffer: InMemoryRegister<u32>,
    sync: InMemoryRegister<u32>,
    chain: InMemoryRegister<u32, DSCR_CHAIN::Register>,
    size: InMemoryRegister<u32, DSCR_SIZE::Register>,
}

impl Default for Descriptor {
    fn default() -> Descriptor {
        Descriptor {
            buffer: InMemoryRegister::new(0),
            sync: InMemoryRegister::new(0),
            chain: InMemoryRegister::new(0),
            size: InMemoryRegister::new(0),
        }
    }
}

/// The descriptor region.
#[repr(C, align(16))]
pub struct DescriptorTable([Descriptor; DESCRIPTOR_COUNT]);

impl Default for DescriptorTable {
    fn default() -> Self {
        DescriptorTable(core::array::from_fn(|_| Descriptor::default()))
    }
}

impl DescriptorTable {
    pub(crate) fn read(&self, index: u16) -> DescriptorConfig {
        let dscr = &self.0[index as usize];
        DescriptorConfig {
            buffer: dscr.buffer.get(),
            sync: dscr.sync.get(),
            chain: dscr.chain.extract(),
            size: dscr.size.extract(),
        }
    }

    pub(crate) fn write(&self, index: u16, config: &DescriptorConfig) {
        let dscr = &self.0[index as usize];
        dscr.buffer.set(config.buffer);
        dscr.sync.set(config.sync);
        dscr.chain.set(config.chain.get());
        dscr.size.set(config.size.get());
    }
}

/// The descriptor region of the device.
pub const DESCRIPTOR_TABLE: StaticRef<DescriptorTable> =
    unsafe { StaticRef::new(DESCRIPTOR_TABLE_BASE as *const DescriptorTable) };

/// A software copy of one descriptor.
#[derive(Clone, Copy)]
pub struct DescriptorConfig {
    /// Buffer address, or 0 for a descriptor without a buffer.
    pub buffer: u32,
    /// Producer / consumer signalling flags, passed through untouched.
    pub sync: u32,
    pub chain: LocalRegisterCopy<u32, DSCR_CHAIN::Register>,
    pub size: LocalRegisterCopy<u32, DSCR_SIZE::Register>,
}

impl DescriptorConfig {
    /// A descriptor whose read and write links both point at `next`.
    pub fn new(buffer: u32, buffer_size: u16, sync: u32, next: u16) -> DescriptorConfig {
        let mut chain = LocalRegisterCopy::new(0);
        chain.write(
            DSCR_CHAIN::RD_NEXT_DSCR.val(next as u32) + DSCR_CHAIN::WR_NEXT_DSCR.val(next as u32),
        );
        DescriptorConfig {
            buffer,
            sync,
            chain,
            size: LocalRegisterCopy::new(buffer_size as u32 & BUFFER_SIZE_MASK),
        }
    }

    /// Next descriptor index in the given direction.
    pub fn next(&self, direction: ChainDirection) -> u16 {
        match direction {
            ChainDirection::Producer => self.chain.read(DSCR_CHAIN::WR_NEXT_DSCR) as u16,
            ChainDirection::Consumer => self.chain.read(DSCR_CHAIN::RD_NEXT_DSCR) as u16,
        }
    }

    /// Buffer capacity in bytes.
    pub fn buffer_size(&self) -> u32 {
        self.size.get() & BUFFER_SIZE_MASK
    }
}

struct PoolState {
    bitmap: [u32; BITMAP_WORDS],
    last_allocated: usize,
    created: bool,
}

/// Bitmap allocator for descriptor slots.
///
/// The bitmap is protected by a critical section. The available count is
/// mirrored in an atomic so [`free_count`](Self::free_count) can be read
/// without taking the lock; that value is advisory and may be stale by the
/// time the caller acts on it.
pub struct DescriptorPool {
    state: Mutex<RefCell<PoolState>>,
    /// Written only inside the critical section. The ARM926 has no atomic
    /// read-modify-write, so updates are a plain load and store.
    available: AtomicUsize,
}

impl DescriptorPool {
    /// A pool that has not been created yet. Every slot counts as used.
    pub const fn new() -> DescriptorPool {
        DescriptorPool {
            state: Mutex::new(RefCell::new(PoolState {
                bitmap: [u32::MAX; BITMAP_WORDS],
                last_allocated: 0,
                created: false,
            })),
            available: AtomicUsize::new(0),
        }
    }

    /// Mark every slot free except the reserved slot 0.
    pub fn create(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            state.bitmap = [0; BITMAP_WORDS];
            state.bitmap[0] = 1;
            state.last_allocated = 0;
            state.created = true;
            self.available.store(DESCRIPTOR_COUNT - 1, Ordering::Relaxed);
        });
    }

    /// Mark every slot used and retire the pool.
    pub fn destroy(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            state.bitmap = [u32::MAX; BITMAP_WORDS];
            state.created = false;
            self.available.store(0, Ordering::Relaxed);
        });
    }

    /// Claim a free slot and return its index.
    ///
    /// The scan starts at the word holding the most recently allocated slot
    /// and wraps around, skipping fully used words without testing bits.
    pub fn allocate(&self) -> Result<u16, ErrorCode> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            if !state.created {
                return Err(ErrorCode::UNINSTALLED);
            }
            if self.available.load(Ordering::Relaxed) == 0 {
                return Err(ErrorCode::NOMEM);
            }

            let start = state.last_allocated / 32;
            for offset in 0..BITMAP_WORDS {
                let word = (start + offset) % BITMAP_WORDS;
                let bits = state.bitmap[word];
                if bits == u32::MAX {
                    continue;
                }
                let bit = (!bits).trailing_zeros() as usize;
                state.bitmap[word] = bits | (1 << bit);
                let index = word * 32 + bit;
                state.last_allocated = index;
                let available = self.available.load(Ordering::Relaxed);
                self.available.store(available - 1, Ordering::Relaxed);
                return Ok(index as u16);
            }

            log::error!(
                "DMA: descriptor pool corrupt, {} slots counted free but none found",
                self.available.load(Ordering::Relaxed)
            );
            Err(ErrorCode::FAIL)
        })
    }

    /// Return a slot to the pool.
    pub fn free(&self, index: u16) -> Result<(), ErrorCode> {
        let index = index as usize;
        if index == 0 || index >= DESCRIPTOR_COUNT {
            return Err(ErrorCode::INVAL);
        }
        critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            if !state.created {
                return Err(ErrorCode::UNINSTALLED);
            }
            state.bitmap[index / 32] &= !(1 << (index % 32));
            let available = self.available.load(Ordering::Relaxed);
            self.available.store(available + 1, Ordering::Relaxed);
            Ok(())
        })
    }

    /// Whether [`create`](Self::create) has run since the last
    /// [`destroy`](Self::destroy).
    pub fn is_created(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).borrow().created)
    }

    /// Number of free slots.
    pub fn free_count(&self) -> usize {
        self.available.load(Ordering::Relaxed)
    }
}

/// Index check shared by the descriptor accessors.
pub(crate) fn check_index(index: u16) -> Result<(), ErrorCode> {
    if index == 0 || index as usize >= DESCRIPTOR_COUNT {
        Err(ErrorCode::INVAL)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_pool() -> DescriptorPool {
        let pool = DescriptorPool::new();
        pool.create();
        pool
    }

    #[test]
    fn create_reserves_slot_zero() {
        let pool = created_pool();
        assert_eq!(pool.free_count(), DESCRIPTOR_COUNT - 1);
        assert_eq!(pool.free(0), Err(ErrorCode::INVAL));
    }

    #[test]
    fn free_rejects_out_of_range() {
        let pool = created_pool();
        assert_eq!(pool.free(DESCRIPTOR_COUNT as u16), Err(ErrorCode::INVAL));
        assert_eq!(pool.free(u16::MAX), Err(ErrorCode::INVAL));
    }

    #[test]
    fn allocate_never_returns_slot_zero() {
        let pool = created_pool();
        for _ in 0..DESCRIPTOR_COUNT - 1 {
            let index = pool.allocate().unwrap();
            assert_ne!(index, 0);
            assert!((index as usize) < DESCRIPTOR_COUNT);
        }
        assert_eq!(pool.allocate(), Err(ErrorCode::NOMEM));
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn allocations_are_unique() {
        let pool = created_pool();
        let mut seen = [false; DESCRIPTOR_COUNT];
        for _ in 0..DESCRIPTOR_COUNT - 1 {
            let index = pool.allocate().unwrap() as usize;
            assert!(!seen[index]);
            seen[index] = true;
        }
    }

    #[test]
    fn free_count_is_conserved() {
        let pool = created_pool();
        let mut live = [0u16; 64];
        let mut live_count = 0;

        // Interleave allocations and frees in an uneven pattern.
        for round in 0..200usize {
            if round % 3 == 2 && live_count > 0 {
                live_count -= 1;
                pool.free(live[live_count]).unwrap();
            } else if live_count < live.len() {
                live[live_count] = pool.allocate().unwrap();
                live_count += 1;
            }
            assert_eq!(pool.free_count() + live_count, DESCRIPTOR_COUNT - 1);
        }

        while live_count > 0 {
            live_count -= 1;
            pool.free(live[live_count]).unwrap();
        }
        assert_eq!(pool.free_count(), DESCRIPTOR_COUNT - 1);
    }

    #[test]
    fn freed_slot_is_reused() {
        let pool = created_pool();
        for _ in 0..DESCRIPTOR_COUNT - 1 {
            pool.allocate().unwrap();
        }
        pool.free(77).unwrap();
        assert_eq!(pool.allocate(), Ok(77));
    }

    #[test]
    fn pool_must_be_created() {
        let pool = DescriptorPool::new();
        assert!(!pool.is_created());
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.allocate(), Err(ErrorCode::UNINSTALLED));
        assert_eq!(pool.free(5), Err(ErrorCode::UNINSTALLED));
    }

    #[test]
    fn destroy_marks_everything_used() {
        let pool = created_pool();
        pool.allocate().unwrap();
        pool.destroy();
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.allocate(), Err(ErrorCode::UNINSTALLED));

        pool.create();
        assert_eq!(pool.free_count(), DESCRIPTOR_COUNT - 1);
    }

    // Double frees are accepted and inflate the count; this pins down the
    // documented behaviour rather than endorsing it.
    #[test]
    fn double_free_is_not_detected() {
        let pool = created_pool();
        let index = pool.allocate().unwrap();
        pool.free(index).unwrap();
        assert_eq!(pool.free(index), Ok(()));
        assert_eq!(pool.free_count(), DESCRIPTOR_COUNT);
    }

    #[test]
    fn descriptor_links_are_symmetric() {
        let table = DescriptorTable::default();
        let config = DescriptorConfig::new(0x4004_0000, 0x200, 0xABCD, 9);
        table.write(3, &config);

        let read = table.read(3);
        assert_eq!(read.buffer, 0x4004_0000);
        assert_eq!(read.sync, 0xABCD);
        assert_eq!(read.next(ChainDirection::Producer), 9);
        assert_eq!(read.next(ChainDirection::Consumer), 9);
        assert_eq!(read.buffer_size(), 0x200);
    }

    #[test]
    fn buffer_size_is_masked() {
        let config = DescriptorConfig::new(0, 0x1FF, 0, 1);
        assert_eq!(config.buffer_size(), 0x1F0);
        assert!(!config.size.is_set(DSCR_SIZE::MARKER));
    }
}
