// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Standard error enum for DMA core operations.

use core::fmt;

/// Errors returned by the descriptor pool, chain builder and socket control.
///
/// Every public entry point checks its arguments first and reports `INVAL`
/// before touching shared state or hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 0,
    /// The worker event queue is full
    BUSY = 1,
    /// The socket is already owned by a channel
    ALREADY = 2,
    /// The IP block owning the socket is powered down
    OFF = 3,
    /// An invalid parameter was passed
    INVAL = 5,
    /// Descriptors or buffer memory not available
    NOMEM = 8,
    /// The descriptor pool has not been created
    UNINSTALLED = 11,
    /// A bounded poll expired before the condition was met
    TIMEOUT = 13,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorCode::FAIL => "generic failure",
            ErrorCode::BUSY => "event queue full",
            ErrorCode::ALREADY => "socket already owned",
            ErrorCode::OFF => "IP block not powered",
            ErrorCode::INVAL => "invalid argument",
            ErrorCode::NOMEM => "out of descriptors or buffer memory",
            ErrorCode::UNINSTALLED => "descriptor pool not created",
            ErrorCode::TIMEOUT => "timed out",
        };
        f.write_str(msg)
    }
}
