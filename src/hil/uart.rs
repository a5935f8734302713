// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! The hardware UART boundary: a one-byte staging slot handed to the
//! peripheral by a UART-feeder routine on its own scheduler slot, exactly
//! as the component design separates the loop's writes from the
//! peripheral's register from the inter-sentence gap timer.

/// Whether the hardware transmit register is free to accept another byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UartTxStatus {
    Ready,
    Busy,
}

/// The output UART as the scheduler sees it: a place to push a byte once
/// the staging slot has one, plus the gap timer that guards
/// inter-sentence silence (armed on `\n`, read-only otherwise).
pub trait HardwareUart {
    fn tx_status(&self) -> UartTxStatus;
    /// Pushes one byte to the hardware transmit register. Only called when
    /// `tx_status()` last reported `Ready`.
    fn tx_write(&mut self, byte: u8);
    /// Sets the output baud rate, as chosen by the `B` configuration
    /// command or at start-up from persisted settings.
    fn set_baud(&mut self, baud: crate::settings::BaudRate);
    /// Arms the inter-sentence gap timer for roughly 30 bit-times at the
    /// current baud. Called once per `\n` emitted.
    fn arm_gap_timer(&mut self);
    /// Whether the gap timer has expired (or was never armed).
    fn gap_elapsed(&self) -> bool;
}

/// A register-backed UART, gated behind the `firmware` feature so the
/// crate builds on a host without `tock-registers` or real peripheral
/// addresses in scope.
#[cfg(feature = "firmware")]
pub mod mmio {
    use super::{HardwareUart, UartTxStatus};
    use crate::settings::BaudRate;
    use tock_registers::interfaces::{Readable, Writeable};
    use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
    use tock_registers::register_bitfields;

    register_bitfields![u8,
        Status [
            TX_READY OFFSET(0) NUMBITS(1) [],
            GAP_ELAPSED OFFSET(1) NUMBITS(1) [],
        ]
    ];

    #[repr(C)]
    pub struct UartRegisters {
        pub status: ReadOnly<u8, Status::Register>,
        pub tx_data: WriteOnly<u8>,
        pub baud_select: ReadWrite<u8>,
        pub gap_arm: WriteOnly<u8>,
    }

    /// A thin wrapper over a `'static` register block. Constructing one
    /// requires the caller to already hold a valid `&'static
    /// UartRegisters` (built from a fixed peripheral address at board
    /// start-up); this type performs no unsafe memory access itself.
    pub struct MmioUart {
        registers: &'static UartRegisters,
    }

    impl MmioUart {
        pub fn new(registers: &'static UartRegisters) -> Self {
            MmioUart { registers }
        }
    }

    impl HardwareUart for MmioUart {
        fn tx_status(&self) -> UartTxStatus {
            if self.registers.status.is_set(Status::TX_READY) {
                UartTxStatus::Ready
            } else {
                UartTxStatus::Busy
            }
        }

        fn tx_write(&mut self, byte: u8) {
            self.registers.tx_data.set(byte);
        }

        fn set_baud(&mut self, baud: BaudRate) {
            self.registers.baud_select.set(baud.code());
        }

        fn arm_gap_timer(&mut self) {
            self.registers.gap_arm.set(1);
        }

        fn gap_elapsed(&self) -> bool {
            self.registers.status.is_set(Status::GAP_ELAPSED)
        }
    }
}
