// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Compile-time configuration options for the FX3 chip crate.
//!
//! Options are collected in one `const` object so that every code path stays
//! type-checked even when an option is disabled; the compiler folds the
//! disabled branches away.

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Log every socket interrupt the dispatcher services, including the
    /// accumulated status and the owner it was routed to.
    pub(crate) trace_interrupts: bool,

    /// Log descriptor chain construction, rollback and teardown.
    pub(crate) trace_chains: bool,
}

/// The only place in this crate where cargo features are read.
pub(crate) const CONFIG: Config = Config {
    trace_interrupts: cfg!(feature = "trace_interrupts"),
    trace_chains: cfg!(feature = "trace_chains"),
};
