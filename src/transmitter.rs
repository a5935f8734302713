// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Drains the transmit queue onto the single shared output UART, one byte
//! per scheduler slot, synthesising the channel prefix fresh from the bank's
//! owner rather than reading it back out of the payload.

use crate::bank::{BankId, BankPool};

/// The transmitter's state machine: IDLE -> SETUP_PREFIX -> SETUP_POINTER ->
/// STREAM -> FINISH_A -> FINISH_B -> IDLE, with the two optional steps
/// (prefix, second terminator byte) skipped according to the settings in
/// force when the sentence started.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    SetupPrefix(BankId),
    SetupPointer(BankId),
    Stream { bank: BankId, sent: usize },
    /// `return_newline` is latched here so `FinishA` knows whether to go on
    /// to `FinishB` or straight back to `Idle` after this byte.
    FinishA { bank: BankId, return_newline: bool },
    FinishB,
    /// Inter-sentence gap: the gap timer (armed by `\n`) is tracked outside
    /// this state machine (see [`crate::housekeeping`]); this state only
    /// marks that the transmitter itself has nothing further to stream
    /// until the scheduler starts the next queued bank.
    Gap,
}

pub struct Transmitter {
    state: State,
    /// The one-byte staging slot (`SD_CH` in the component design): set by
    /// [`produce`](Self::produce), cleared by [`take_pending`](Self::take_pending).
    /// Production and consumption are deliberately different methods, called
    /// from different scheduler slots, so a byte can sit here for several
    /// rounds while the UART is busy or the inter-sentence gap timer is
    /// still running without being overwritten or dropped.
    pending: Option<u8>,
}

impl Transmitter {
    pub const fn new() -> Self {
        Transmitter {
            state: State::Idle,
            pending: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Begins transmitting `bank`. Caller must only call this when
    /// [`is_idle`](Self::is_idle) is true; the scheduler enforces this by
    /// only popping the queue once the transmitter reports idle.
    ///
    /// `include_prefix` and `return_newline` are read once, at the start of
    /// the sentence: the component design never changes output settings
    /// mid-transmission (a configuration-dialogue visit fully reinitialises
    /// core state, including any sentence in flight).
    pub fn start(&mut self, bank: BankId, include_prefix: bool, _return_newline: bool) {
        debug_assert!(self.is_idle(), "started a transmission while busy");
        self.state = if include_prefix {
            State::SetupPrefix(bank)
        } else {
            State::SetupPointer(bank)
        };
    }

    /// Advances the state machine by one scheduler slot, filling the
    /// staging slot with its next byte. A no-op if the slot is still full:
    /// production and consumption are coupled through `pending`, matching
    /// "reject (no-op) if the slot is still full" for STREAM, and extended
    /// to every other byte-producing state so nothing already sitting in
    /// the slot is ever overwritten.
    ///
    /// Frees the bank back into `pool` the moment its payload has been
    /// fully streamed, so the channel can reuse it before the terminator
    /// bytes finish going out.
    ///
    /// `return_newline` must be the same value passed to [`start`](Self::start)
    /// for the sentence currently in flight; it is re-supplied here (rather
    /// than only latched at `start`) because `SetupPointer` has nowhere to
    /// carry it and still needs to hand it on to `FinishA`.
    pub fn produce(&mut self, pool: &mut BankPool, return_newline: bool) {
        if self.pending.is_some() {
            return;
        }
        match self.state {
            State::Idle | State::Gap => {
                if matches!(self.state, State::Gap) {
                    self.state = State::Idle;
                }
            }
            State::SetupPrefix(bank) => {
                let owner = pool.get(bank).owner().unwrap_or(0);
                self.state = State::SetupPointer(bank);
                self.pending = Some(b'1' + owner);
            }
            State::SetupPointer(bank) => {
                self.state = State::Stream { bank, sent: 0 };
            }
            State::Stream { bank, sent } => {
                let payload = pool.get(bank).payload();
                if sent < payload.len() {
                    let byte = payload[sent];
                    self.state = State::Stream {
                        bank,
                        sent: sent + 1,
                    };
                    self.pending = Some(byte);
                } else {
                    pool.free(bank);
                    self.state = State::FinishA {
                        bank,
                        return_newline,
                    };
                    self.pending = Some(if return_newline { b'\r' } else { b'\n' });
                }
            }
            State::FinishA {
                bank,
                return_newline,
            } => {
                if return_newline {
                    self.state = State::FinishB;
                } else {
                    let _ = bank;
                    self.state = State::Gap;
                }
            }
            State::FinishB => {
                self.state = State::Gap;
                self.pending = Some(b'\n');
            }
        }
    }

    /// Takes the staging slot's byte, if any, clearing it so `produce` can
    /// fill it again next round. The caller (the UART feeder, on its own
    /// scheduler slot) is responsible for only calling this once the
    /// hardware UART is ready and the inter-sentence gap timer allows it.
    pub fn take_pending(&mut self) -> Option<u8> {
        self.pending.take()
    }
}
