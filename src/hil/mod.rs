// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Hardware interface layer: the narrow set of traits the scheduler
//! programs against, so the rest of the crate is oblivious to whether it
//! is running against real registers or a host-side fake.
//!
//! Keeps a `hil` trait layer separate from board-specific concrete
//! implementations: components take `&dyn Trait` or a generic bound,
//! never a concrete register type.

pub mod gpio;
pub mod uart;

pub use gpio::{InputPin, OutputPin};
pub use uart::{HardwareUart, UartTxStatus};