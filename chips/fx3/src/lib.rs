// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Peripheral implementations for the FX3 USB 3.0 peripheral controller.
//!
//! This crate currently contains the DMA fabric core: the descriptor pool,
//! descriptor chains, socket control and the socket interrupt dispatcher that
//! every peripheral driver (USB, GPIF, storage, serial) rides on top of.

#![no_std]
#![crate_name = "fx3"]
#![crate_type = "rlib"]

mod config;

pub mod dma;
pub mod errorcode;
pub mod static_ref;
pub mod support;

pub use crate::errorcode::ErrorCode;
pub use crate::static_ref::StaticRef;
