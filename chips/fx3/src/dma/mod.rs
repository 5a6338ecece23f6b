// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! DMA fabric core.
//!
//! Every peripheral block on the FX3 moves data through hardware *sockets*.
//! A socket walks a chain of descriptors taken from one shared table, filling
//! (producer) or draining (consumer) the buffer each descriptor names.
//!
//! [`DmaSubsystem`] owns the pieces that have to agree with each other: the
//! descriptor table and its pool, the socket register file, the buffer arena
//! backing chains, and the table recording which channel owns which socket.
//! The operations are split across the submodules:
//!
//! - [`descriptor`]: descriptor layout and slot allocation.
//! - [`chain`]: building and tearing down descriptor chains.
//! - [`socket`]: socket identification, configuration and control.
//! - [`interrupt`]: socket interrupt dispatch to channels and callbacks.
//! - [`queue`]: the event queue carrying dispatched events to the worker.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! let dma = static_init!(
//!     DmaSubsystem<'static>,
//!     DmaSubsystem::new(&fx3::dma::DESCRIPTOR_TABLE, &MMIO_SOCKETS, &arena, &queue)
//! );
//! dma.init();
//! let head = dma.create_chain(4, 512, 0)?;
//! ```

use tock_cells::optional_cell::OptionalCell;

pub mod chain;
pub mod descriptor;
pub mod interrupt;
pub mod queue;
pub mod socket;

#[cfg(test)]
mod fake;

pub use self::chain::BufferArena;
pub use self::descriptor::{
    ChainDirection, DescriptorConfig, DescriptorPool, DescriptorTable, DESCRIPTOR_COUNT,
    DESCRIPTOR_TABLE,
};
pub use self::interrupt::{
    ChannelHandle, DmaEvent, DmaEventSink, ModuleId, SocketEventClient, SocketOwner,
};
pub use self::queue::EventQueue;
pub use self::socket::{
    IpBlock, MmioSocketRegisters, SocketConfig, SocketId, SocketReg, SocketRegisterFile,
    SuspendOption,
};

use self::socket::{IP_BLOCK_COUNT, MAX_SOCKETS_PER_BLOCK};

/// The DMA core of one device.
pub struct DmaSubsystem<'a> {
    descriptors: &'a DescriptorTable,
    registers: &'a dyn SocketRegisterFile,
    arena: &'a dyn BufferArena,
    events: &'a dyn DmaEventSink,
    pool: DescriptorPool,
    handles: [[OptionalCell<ChannelHandle>; MAX_SOCKETS_PER_BLOCK]; IP_BLOCK_COUNT],
    callback: OptionalCell<&'a dyn SocketEventClient>,
}

impl<'a> DmaSubsystem<'a> {
    pub fn new(
        descriptors: &'a DescriptorTable,
        registers: &'a dyn SocketRegisterFile,
        arena: &'a dyn BufferArena,
        events: &'a dyn DmaEventSink,
    ) -> DmaSubsystem<'a> {
        DmaSubsystem {
            descriptors,
            registers,
            arena,
            events,
            pool: DescriptorPool::new(),
            handles: core::array::from_fn(|_| core::array::from_fn(|_| OptionalCell::empty())),
            callback: OptionalCell::empty(),
        }
    }

    /// Bring the core up: create the descriptor pool and forget every
    /// socket owner.
    pub fn init(&self) {
        self.pool.create();
        self.clear_owners();
    }

    /// Tear the core down. Chains still alive are not walked; their slots
    /// are simply retired with the pool.
    pub fn deinit(&self) {
        self.clear_owners();
        self.pool.destroy();
    }

    /// Number of descriptor slots currently free.
    pub fn free_descriptors(&self) -> usize {
        self.pool.free_count()
    }

    /// Direct access to the slot allocator, for callers managing their own
    /// descriptors.
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn clear_owners(&self) {
        self.handles
            .iter()
            .flatten()
            .for_each(OptionalCell::clear);
        self.callback.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeArena, FakeSockets};
    use super::socket::SCK_INTR;
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn pib_consumer_transfer_done_reaches_worker() {
        let table = DescriptorTable::default();
        let sockets = FakeSockets::new();
        let arena = FakeArena::new();
        let mut storage = [DmaEvent::default(); 8];
        let queue = EventQueue::new(&mut storage);
        let dma = DmaSubsystem::new(&table, &sockets, &arena, &queue);

        dma.init();
        assert_eq!(dma.free_descriptors(), DESCRIPTOR_COUNT - 1);

        let head = dma.create_chain(4, 512, 0).unwrap();
        let socket = SocketId::new(IpBlock::ParallelInterface, 7);
        assert!(dma.is_valid_consumer(socket));
        dma.attach(socket, ChannelHandle(0x55)).unwrap();

        // Point the socket at the chain the way the channel layer would.
        let mut config = dma.get_config(socket).unwrap();
        config.dscr.set(head as u32);
        config.intr_mask.write(SCK_INTR::TRANS_DONE::SET);
        dma.set_config(socket, &config).unwrap();
        dma.enable(socket).unwrap();

        sockets.raise(IpBlock::ParallelInterface, 7, SCK_INTR::TRANS_DONE::SET.value);
        dma.handle_interrupt(IpBlock::ParallelInterface);

        let event = queue.receive().unwrap();
        assert!(queue.receive().is_none());
        assert_eq!(event.socket, socket);
        assert_eq!(event.socket.raw() & 0xFF, 7);
        assert_eq!(event.channel, ChannelHandle(0x55));
        assert_eq!(event.chain_head, head);
        assert!(event.status.is_set(SCK_INTR::TRANS_DONE));
        assert_eq!(sockets.pending(IpBlock::ParallelInterface, 7), 0);

        dma.disable(socket).unwrap();
        dma.detach(socket).unwrap();
        dma.destroy_chain(head, 4, ChainDirection::Consumer, true)
            .unwrap();
        assert_eq!(dma.free_descriptors(), 255);
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn deinit_retires_pool_and_owners() {
        let table = DescriptorTable::default();
        let sockets = FakeSockets::new();
        let arena = FakeArena::new();
        let mut storage = [DmaEvent::default(); 4];
        let queue = EventQueue::new(&mut storage);
        let dma = DmaSubsystem::new(&table, &sockets, &arena, &queue);

        assert_eq!(dma.create_chain(1, 0, 0), Err(ErrorCode::UNINSTALLED));

        dma.init();
        let socket = SocketId::new(IpBlock::StorageInterface, 2);
        dma.attach(socket, ChannelHandle(1)).unwrap();
        dma.deinit();

        assert_eq!(dma.free_descriptors(), 0);
        assert_eq!(dma.pool().allocate(), Err(ErrorCode::UNINSTALLED));
        assert!(matches!(dma.owner_of(socket), Ok(SocketOwner::Unowned)));
    }
}
