// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! The four reserved-slot tasks the scheduler rotates through: the
//! loop-time profiler, the configuration-pin poll, the per-channel busy
//! timer step, and the stuck-bank sweep.

use crate::bank::{BankPool, BankSlot};
use crate::channel::{Channel, CHANNEL_COUNT};
use crate::config_dialogue::ConfigDialogue;
use crate::diag::Diagnostics;
use crate::hil::gpio::InputPin;
use crate::settings::{Settings, SettingsStore};

/// Running min/max of the time between consecutive calls to
/// [`LoopTimeProfile::sample`], in whatever tick unit the caller's clock
/// uses. Purely diagnostic: nothing downstream reads these but the `G`
/// configuration command.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoopTimeProfile {
    previous: Option<u32>,
    pub min: u32,
    pub max: u32,
}

impl LoopTimeProfile {
    pub const fn new() -> Self {
        LoopTimeProfile {
            previous: None,
            min: u32::MAX,
            max: 0,
        }
    }

    /// Records one reading of the free-running loop-time clock, updating
    /// the running bounds from the delta against the previous reading.
    /// The first call after construction or a reset only seeds `previous`.
    pub fn sample(&mut self, now: u32) {
        if let Some(prev) = self.previous {
            let delta = now.wrapping_sub(prev);
            self.min = self.min.min(delta);
            self.max = self.max.max(delta);
        }
        self.previous = Some(now);
    }
}

/// Ticks every channel's busy counter down by `decrement`, clearing the
/// channel's contribution to `CH_BUSY` (here: `Channel::is_busy`) the
/// moment it reaches zero. The component design spreads this across two
/// reserved slots, four channels each, per outer cycle; the split is a
/// scheduling decision, not a semantic one, so this function takes
/// whichever slice of channels the caller is currently responsible for.
pub fn timer_step(channels: &mut [Channel], decrement: u16) {
    for channel in channels.iter_mut() {
        channel.timer = channel.timer.saturating_sub(decrement);
    }
}

/// Invocation count between stuck-bank sweeps: ~7 s at one housekeeping
/// slot per outer cycle.
pub const SWEEP_INTERVAL: u32 = 16_384;

/// Detects and recovers banks abandoned mid-sentence by a transmitter that
/// has gone silent. Requires two consecutive quiet windows on the same
/// channel before freeing anything, so a channel that is merely slow (but
/// still sending) is never mistaken for stuck.
pub struct StuckBankSweeper {
    invocations: u32,
    activity: u8,
    previous_activity: u8,
    candidate: Option<u8>,
}

impl StuckBankSweeper {
    pub const fn new() -> Self {
        StuckBankSweeper {
            invocations: 0,
            activity: 0,
            previous_activity: 0,
            candidate: None,
        }
    }

    /// Called by the assembler whenever a byte is appended to (or a
    /// sentence started in) a channel's bank; marks this window as having
    /// seen activity on `channel_index`.
    pub fn note_activity(&mut self, channel_index: u8) {
        self.activity |= 1 << channel_index;
    }

    /// Runs once per housekeeping invocation. Every [`SWEEP_INTERVAL`]
    /// calls, frees the channel flagged stuck on the previous sweep if it
    /// is still stuck, then flags whichever in-progress channel (if any)
    /// saw no activity across both of the last two windows.
    pub fn tick(&mut self, channels: &mut [Channel], pool: &mut BankPool, diag: &mut Diagnostics) {
        self.invocations += 1;
        if self.invocations < SWEEP_INTERVAL {
            return;
        }
        self.invocations = 0;

        let quiet = !(self.activity | self.previous_activity);

        if let Some(channel_index) = self.candidate.take() {
            let bit = 1 << channel_index;
            if quiet & bit != 0 {
                if let Some(channel) = channels.get_mut(channel_index as usize) {
                    if let Some(id) = channel.bank.bank() {
                        pool.free(id);
                        channel.bank = BankSlot::None;
                        diag.bump_stuck_bank_recovered(channel_index);
                    }
                }
            }
        }

        self.candidate = channels
            .iter()
            .enumerate()
            .find(|&(i, ch)| quiet & (1u8 << i as u32) != 0 && !ch.bank.is_idle())
            .map(|(i, _)| i as u8);

        self.previous_activity = self.activity;
        self.activity = 0;
    }
}

/// Polls the configuration pin; if asserted, hands control to the
/// interactive dialogue and returns the settings it left in force. The
/// caller (the scheduler) is responsible for reinitialising every other
/// piece of core state on a `Some` return, per the external interface's
/// "core state is fully reinitialised on return" contract.
pub fn poll_configuration(
    pin: &dyn InputPin,
    dialogue: &mut dyn ConfigDialogue,
    settings: Settings,
    store: &mut dyn SettingsStore,
    diag: &mut Diagnostics,
) -> Option<Settings> {
    if !pin.is_asserted_low() {
        return None;
    }
    Some(dialogue.run(settings, store, diag))
}
