// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! The line-oriented command grammar entered when the configuration pin is
//! asserted. Command parsing and command application are kept as pure
//! functions (`parse_command`, `apply_command`) so they can be tested
//! without a line source or a settings store; the interactive read/print
//! loop itself is the external-collaborator boundary
//! ([`ConfigDialogue::run`]), implemented on the firmware target by a
//! UART line reader and in tests by [`crate::test_support::FakeConfigDialogue`].

use crate::channel::CHANNEL_COUNT;
use crate::diag::Diagnostics;
use crate::settings::{BaudRate, Settings, SettingsError, SettingsStore};

/// One parsed command line. Field names follow the one-letter command
/// grammar (`I`, `J`, `C`, ...) rather than what each field does, matching
/// the external interface's own naming.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    InputInvert { mask: [u8; 2] },
    OutputInvert(bool),
    ChannelPrefix(bool),
    ReturnNewline(bool),
    DiscardStart { channel: u8, byte: u8 },
    FastMask(u8),
    SuppressMask { channel: u8, mask: u8 },
    SchmittMask(u8),
    OutputBaud(BaudRate),
    PrintSettings,
    PrintDiagnostics,
    ReloadUser,
    SaveUser,
    ReloadFactory,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    UnknownLetter(u8),
    BadArgument,
}

fn hex_byte(s: &[u8]) -> Option<u8> {
    if s.len() != 2 {
        return None;
    }
    let hi = (s[0] as char).to_digit(16)?;
    let lo = (s[1] as char).to_digit(16)?;
    Some(((hi << 4) | lo) as u8)
}

fn digit(s: &[u8]) -> Option<u8> {
    if s.len() != 1 {
        return None;
    }
    (s[0] as char).to_digit(10).map(|d| d as u8)
}

/// Parses one command line, with the trailing `\n` or `\r\n` already
/// stripped by the caller.
pub fn parse_command(line: &[u8]) -> Result<Command, CommandError> {
    let (&letter, rest) = line.split_first().ok_or(CommandError::Empty)?;
    match letter {
        b'I' => {
            let byte = hex_byte(rest).ok_or(CommandError::BadArgument)?;
            Ok(Command::InputInvert { mask: [byte, byte] })
        }
        b'J' => Ok(Command::OutputInvert(digit(rest).ok_or(CommandError::BadArgument)? != 0)),
        b'C' => Ok(Command::ChannelPrefix(digit(rest).ok_or(CommandError::BadArgument)? != 0)),
        b'N' => Ok(Command::ReturnNewline(digit(rest).ok_or(CommandError::BadArgument)? != 0)),
        b'D' => {
            let (&chan_digit, hex) = rest.split_first().ok_or(CommandError::BadArgument)?;
            let channel = (chan_digit as char)
                .to_digit(10)
                .ok_or(CommandError::BadArgument)? as u8;
            if channel as usize >= CHANNEL_COUNT {
                return Err(CommandError::BadArgument);
            }
            let byte = hex_byte(hex).ok_or(CommandError::BadArgument)?;
            Ok(Command::DiscardStart { channel, byte })
        }
        b'F' => {
            let mask = hex_byte(rest).ok_or(CommandError::BadArgument)?;
            Ok(Command::FastMask(mask))
        }
        b'U' => {
            let (&chan_digit, hex) = rest.split_first().ok_or(CommandError::BadArgument)?;
            let channel = (chan_digit as char)
                .to_digit(10)
                .ok_or(CommandError::BadArgument)? as u8;
            if channel as usize >= CHANNEL_COUNT {
                return Err(CommandError::BadArgument);
            }
            let mask = hex_byte(hex).ok_or(CommandError::BadArgument)?;
            Ok(Command::SuppressMask { channel, mask })
        }
        b'H' => {
            let mask = hex_byte(rest).ok_or(CommandError::BadArgument)?;
            Ok(Command::SchmittMask(mask))
        }
        b'B' => {
            let code = digit(rest).ok_or(CommandError::BadArgument)?;
            BaudRate::from_code(code)
                .map(Command::OutputBaud)
                .ok_or(CommandError::BadArgument)
        }
        b'P' if rest.is_empty() => Ok(Command::PrintSettings),
        b'G' if rest.is_empty() => Ok(Command::PrintDiagnostics),
        b'L' if rest.is_empty() => Ok(Command::ReloadUser),
        b'S' if rest.is_empty() => Ok(Command::SaveUser),
        b'R' if rest.is_empty() => Ok(Command::ReloadFactory),
        other => Err(CommandError::UnknownLetter(other)),
    }
}

/// What the dialogue should print after applying a command, beyond the
/// plain `Ok\n` / `Error\n` every command gets.
#[derive(Debug, PartialEq, Eq)]
pub enum DialogueOutcome {
    Applied,
    Printed,
}

/// Applies one already-parsed command to `settings`, persisting through
/// `store` and reading `diag` where the grammar calls for it (`G`, `L`,
/// `R`). Returns `Err` only when the backing store itself fails; a
/// successfully-parsed-but-store-failing command still reports `Error\n`
/// to the user, which the caller maps from this `Result`.
pub fn apply_command(
    command: Command,
    settings: &mut Settings,
    store: &mut dyn SettingsStore,
    diag: &mut Diagnostics,
) -> Result<DialogueOutcome, SettingsError> {
    match command {
        Command::InputInvert { mask } => {
            settings.input_invert_mask = mask;
            Ok(DialogueOutcome::Applied)
        }
        Command::OutputInvert(on) => {
            settings.output_invert = on;
            Ok(DialogueOutcome::Applied)
        }
        Command::ChannelPrefix(on) => {
            settings.channel_prefix = on;
            Ok(DialogueOutcome::Applied)
        }
        Command::ReturnNewline(on) => {
            settings.return_newline = on;
            Ok(DialogueOutcome::Applied)
        }
        Command::DiscardStart { channel, byte } => {
            settings.discard_start[channel as usize] = byte;
            Ok(DialogueOutcome::Applied)
        }
        Command::FastMask(mask) => {
            settings.fast_mask = mask;
            Ok(DialogueOutcome::Applied)
        }
        Command::SuppressMask { channel, mask } => {
            settings.suppress_mask[channel as usize] = mask;
            Ok(DialogueOutcome::Applied)
        }
        Command::SchmittMask(mask) => {
            settings.schmitt_mask = mask;
            Ok(DialogueOutcome::Applied)
        }
        Command::OutputBaud(baud) => {
            settings.output_baud = baud;
            Ok(DialogueOutcome::Applied)
        }
        Command::PrintSettings => Ok(DialogueOutcome::Printed),
        Command::PrintDiagnostics => Ok(DialogueOutcome::Printed),
        Command::ReloadUser => {
            *settings = store.load_user()?;
            diag.clear_err_channels();
            Ok(DialogueOutcome::Applied)
        }
        Command::SaveUser => {
            store.save_user(settings)?;
            Ok(DialogueOutcome::Applied)
        }
        Command::ReloadFactory => {
            *settings = store.load_factory()?;
            store.save_user(settings)?;
            diag.clear_err_channels();
            Ok(DialogueOutcome::Applied)
        }
    }
}

/// The interactive line-reading loop itself: the part that genuinely
/// depends on a live terminal, implemented on the firmware target by a
/// UART line reader and by [`crate::test_support::FakeConfigDialogue`] in
/// tests. Entering and leaving this loop is the only housekeeping hook the
/// core has into the dialogue; everything the dialogue does once entered
/// is just repeated `parse_command`/`apply_command` pairs.
pub trait ConfigDialogue {
    /// Runs until the configuration pin is released. Returns the settings
    /// in force when the dialogue exits, for the core to adopt as it
    /// reinitialises.
    fn run(
        &mut self,
        settings: Settings,
        store: &mut dyn SettingsStore,
        diag: &mut Diagnostics,
    ) -> Settings;
}
