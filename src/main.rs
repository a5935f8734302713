// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Bare-metal entry point.
//!
//! Wiring concrete peripheral addresses into [`hil::uart::mmio::MmioUart`]
//! and the two port registers is board bring-up, not core logic, and is
//! deliberately left out here: the core only needs types that implement
//! [`nmea8_mux::sampler::PortReader`], [`nmea8_mux::hil::HardwareUart`],
//! [`nmea8_mux::hil::InputPin`], [`nmea8_mux::config_dialogue::ConfigDialogue`],
//! and [`nmea8_mux::settings::SettingsStore`]; a board crate supplies those
//! and calls [`nmea8_mux::scheduler::Core::new`] followed by
//! [`nmea8_mux::scheduler::Core::run_round`] in a loop, as below.

#![no_std]
#![no_main]

use nmea8_mux::settings::Settings;

#[allow(unused_imports)]
use nmea8_mux::io as _;

/// Placeholder entry point. A real board's startup crate calls this after
/// clock and peripheral initialisation; it never returns.
#[no_mangle]
pub extern "C" fn main() -> ! {
    let _settings = Settings::factory_default();
    loop {
        core::hint::spin_loop();
    }
}