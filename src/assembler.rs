// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Drives a channel's sentence lifecycle from the first byte through its
//! terminator or failure, using the shared bank pool and the channel's own
//! suppression/discard-start/busy-timer fields.

use crate::bank::{BankId, BankPool, BankSlot};
use crate::channel::{Channel, TIMER_HIGH};
use crate::classifier::{classify, Class};
use crate::diag::Diagnostics;

/// What the assembler did with one byte. The scheduler uses this to decide
/// whether to enqueue a bank for transmission.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssembleOutcome {
    /// Byte absorbed; nothing else to do.
    Continue,
    /// The sentence completed; this bank is ready for the transmit queue.
    Complete(BankId),
}

/// Feeds one classified byte to `channel`'s sentence lifecycle. `all_busy`
/// is the `CH_BUSY` bitmap as seen by every channel *other than* this one
/// (suppression never considers a channel busy with itself).
pub fn feed_byte(
    channel: &mut Channel,
    channel_index: u8,
    byte: u8,
    other_busy: u8,
    pool: &mut BankPool,
    diag: &mut Diagnostics,
) -> AssembleOutcome {
    let class = classify(byte);

    match channel.bank {
        BankSlot::None => feed_preallocation(channel, channel_index, class, other_busy, pool, diag),
        BankSlot::Discard => {
            if class == Class::Terminator {
                channel.bank = BankSlot::None;
            }
            AssembleOutcome::Continue
        }
        BankSlot::InProgress(id) => {
            feed_in_progress(channel, channel_index, id, class, pool, diag)
        }
        BankSlot::Invalid(id) => {
            // Draining to the terminator: bytes are absorbed, not stored.
            if class == Class::Terminator {
                pool.free(id);
                channel.bank = BankSlot::None;
            }
            AssembleOutcome::Continue
        }
    }
}

fn feed_preallocation(
    channel: &mut Channel,
    channel_index: u8,
    class: Class,
    other_busy: u8,
    pool: &mut BankPool,
    diag: &mut Diagnostics,
) -> AssembleOutcome {
    match class {
        // A stray \r or \n between sentences.
        Class::Terminator => AssembleOutcome::Continue,
        Class::Printable(byte) if byte == channel.discard_start => {
            channel.bank = BankSlot::Discard;
            AssembleOutcome::Continue
        }
        Class::Binary => {
            diag.bump_binary(channel_index);
            channel.bank = BankSlot::Discard;
            AssembleOutcome::Continue
        }
        Class::Printable(byte) => {
            if channel.suppress_mask & other_busy != 0 {
                channel.bank = BankSlot::Discard;
                return AssembleOutcome::Continue;
            }
            match pool.allocate(channel_index) {
                Some(id) => {
                    pool.append(id, byte);
                    channel.bank = BankSlot::InProgress(id);
                }
                None => {
                    diag.bump_congestion(channel_index);
                    channel.bank = BankSlot::Discard;
                }
            }
            AssembleOutcome::Continue
        }
    }
}

fn feed_in_progress(
    channel: &mut Channel,
    channel_index: u8,
    id: BankId,
    class: Class,
    pool: &mut BankPool,
    diag: &mut Diagnostics,
) -> AssembleOutcome {
    match class {
        Class::Terminator => {
            channel.timer = TIMER_HIGH;
            channel.bank = BankSlot::None;
            AssembleOutcome::Complete(id)
        }
        Class::Binary => {
            diag.bump_binary(channel_index);
            channel.bank = BankSlot::Invalid(id);
            AssembleOutcome::Continue
        }
        Class::Printable(byte) => {
            if pool.append(id, byte) {
                AssembleOutcome::Continue
            } else {
                diag.bump_overlong(channel_index);
                channel.bank = BankSlot::Invalid(id);
                AssembleOutcome::Continue
            }
        }
    }
}
