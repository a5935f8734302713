// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Panic handler for the bare-metal target.
//!
//! There is no process table and no supervisor to hand a fault to: a
//! panicked core loop simply has nothing left to do that it can trust, so
//! it parks the core. A board bring-up can wire this to blink a status LED
//! or push the panic message out the debug UART the way a live board
//! would; until one does, halting is the safe default.

use core::panic::PanicInfo;

#[cfg(all(not(test), feature = "firmware"))]
#[panic_handler]
fn panic_fmt(_info: &PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}