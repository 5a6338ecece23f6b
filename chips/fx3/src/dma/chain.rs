// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Descriptor chains.
//!
//! A chain is `count` descriptors linked into a ring: the last descriptor
//! points back at the head. Each descriptor optionally owns an equally sized
//! buffer from the [`BufferArena`]. Chains are built with the same next
//! index on the producer and consumer side; the channel layer may rewrite
//! individual links afterwards through [`DmaSubsystem::set_descriptor`].
//!
//! Construction either returns a complete chain or leaves the pool and the
//! arena exactly as it found them.

use super::descriptor::{self, ChainDirection, DescriptorConfig};
use super::DmaSubsystem;
use crate::config::CONFIG;
use crate::support;
use crate::ErrorCode;

/// Memory that DMA buffers are carved from.
pub trait BufferArena {
    /// Allocate `size` bytes, or `None` if the arena is exhausted.
    fn alloc(&self, size: u32) -> Option<u32>;
    fn free(&self, address: u32);
    /// First address of the arena.
    fn base(&self) -> u32;
    /// One past the last address of the arena.
    fn limit(&self) -> u32;
}

impl DmaSubsystem<'_> {
    /// Read descriptor `index`.
    pub fn get_descriptor(&self, index: u16) -> Result<DescriptorConfig, ErrorCode> {
        descriptor::check_index(index)?;
        support::barrier();
        Ok(self.descriptors.read(index))
    }

    /// Overwrite descriptor `index`.
    pub fn set_descriptor(&self, index: u16, config: &DescriptorConfig) -> Result<(), ErrorCode> {
        descriptor::check_index(index)?;
        self.descriptors.write(index, config);
        support::barrier();
        Ok(())
    }

    fn buffer_in_arena(&self, address: u32, size: u32) -> bool {
        address >= self.arena.base()
            && address
                .checked_add(size)
                .is_some_and(|end| end <= self.arena.limit())
    }

    /// Build a ring of `count` descriptors and return the head index.
    ///
    /// With `buffer_size` zero no buffers are attached. `sync` is copied into
    /// every descriptor unchanged.
    pub fn create_chain(&self, count: u16, buffer_size: u16, sync: u32) -> Result<u16, ErrorCode> {
        if count == 0 {
            return Err(ErrorCode::INVAL);
        }
        if !self.pool.is_created() {
            return Err(ErrorCode::UNINSTALLED);
        }
        if self.pool.free_count() < count as usize {
            return Err(ErrorCode::NOMEM);
        }

        let head = self.pool.allocate()?;
        let mut current = head;
        let mut built: u16 = 0;
        let mut error = None;

        while built < count {
            built += 1;
            let next = if built == count {
                head
            } else {
                match self.pool.allocate() {
                    Ok(index) => index,
                    Err(e) => {
                        // Another caller took the slots we counted on. Close
                        // the ring here so the rollback walk terminates.
                        error = Some(e);
                        head
                    }
                }
            };

            let mut buffer = 0;
            if buffer_size != 0 {
                match self.arena.alloc(buffer_size as u32) {
                    Some(address) if self.buffer_in_arena(address, buffer_size as u32) => {
                        buffer = address;
                    }
                    Some(address) => {
                        log::warn!("DMA: buffer {:#010x} outside arena", address);
                        self.arena.free(address);
                        error = Some(ErrorCode::NOMEM);
                    }
                    None => error = Some(ErrorCode::NOMEM),
                }
            }

            self.descriptors
                .write(current, &DescriptorConfig::new(buffer, buffer_size, sync, next));
            support::barrier();

            if next == head {
                break;
            }
            current = next;
        }

        if let Some(e) = error {
            if CONFIG.trace_chains {
                log::debug!("DMA: rolling back chain at {} ({} of {}): {}", head, built, count, e);
            }
            if let Err(rollback) = self.destroy_chain(head, built, ChainDirection::Producer, true)
            {
                log::error!("DMA: rollback of chain at {} failed: {}", head, rollback);
            }
            return Err(ErrorCode::NOMEM);
        }

        if CONFIG.trace_chains {
            log::debug!("DMA: chain at {}, {} x {} bytes", head, count, buffer_size);
        }
        Ok(head)
    }

    /// Release `count` descriptors starting at `head`, following the
    /// producer or consumer links.
    ///
    /// The walk is exactly `count` steps long. A count that does not match
    /// the chain either leaves descriptors behind or frees slots belonging
    /// to someone else. Every link on the walk is checked before anything is
    /// released; a reserved or out-of-range link fails with `INVAL` and
    /// leaves the chain intact.
    pub fn destroy_chain(
        &self,
        head: u16,
        count: u16,
        direction: ChainDirection,
        free_buffers: bool,
    ) -> Result<(), ErrorCode> {
        if count == 0 {
            return Err(ErrorCode::INVAL);
        }
        if !self.pool.is_created() {
            return Err(ErrorCode::UNINSTALLED);
        }
        descriptor::check_index(head)?;

        support::barrier();
        let mut index = head;
        for step in 1..count {
            index = self.descriptors.read(index).next(direction);
            if descriptor::check_index(index).is_err() {
                log::warn!("DMA: chain at {} has bad link {} at step {}", head, index, step);
                return Err(ErrorCode::INVAL);
            }
        }

        index = head;
        for _ in 0..count {
            let dscr = self.descriptors.read(index);
            if free_buffers && dscr.buffer != 0 {
                self.arena.free(dscr.buffer);
            }
            self.pool.free(index)?;
            index = dscr.next(direction);
        }

        if CONFIG.trace_chains {
            log::debug!("DMA: freed chain at {} ({} descriptors)", head, count);
        }
        Ok(())
    }
}
