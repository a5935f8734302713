// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Host-side fakes for the external-collaborator traits, used by this
//! crate's own tests and available to integration tests and the `std`
//! build generally. A simulated backend sits behind the same trait the
//! real hardware implements, so the component under test cannot tell the
//! difference.

extern crate std;

use std::vec::Vec;

use crate::config_dialogue::ConfigDialogue;
use crate::diag::Diagnostics;
use crate::settings::{Settings, SettingsError, SettingsStore};

/// An in-memory settings store. Failing either operation is opt-in, so
/// tests can exercise the "store failed" paths without a second type.
pub struct FakeSettingsStore {
    pub user: Settings,
    pub factory: Settings,
    pub fail_loads: bool,
    pub fail_saves: bool,
}

impl FakeSettingsStore {
    pub fn new(factory: Settings) -> Self {
        FakeSettingsStore {
            user: factory,
            factory,
            fail_loads: false,
            fail_saves: false,
        }
    }
}

impl SettingsStore for FakeSettingsStore {
    fn load_user(&mut self) -> Result<Settings, SettingsError> {
        if self.fail_loads {
            return Err(SettingsError::ReadFailed);
        }
        Ok(self.user)
    }

    fn save_user(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        if self.fail_saves {
            return Err(SettingsError::WriteFailed);
        }
        self.user = *settings;
        Ok(())
    }

    fn load_factory(&mut self) -> Result<Settings, SettingsError> {
        if self.fail_loads {
            return Err(SettingsError::ReadFailed);
        }
        Ok(self.factory)
    }
}

/// Replays a scripted sequence of command lines instead of reading from a
/// live terminal; used to test the housekeeping config-poll hook without
/// a real UART line reader.
pub struct FakeConfigDialogue {
    pub lines: Vec<Vec<u8>>,
    pub transcript: Vec<Vec<u8>>,
}

impl FakeConfigDialogue {
    pub fn new(lines: Vec<Vec<u8>>) -> Self {
        FakeConfigDialogue {
            lines,
            transcript: Vec::new(),
        }
    }
}

impl ConfigDialogue for FakeConfigDialogue {
    fn run(
        &mut self,
        mut settings: Settings,
        store: &mut dyn SettingsStore,
        diag: &mut Diagnostics,
    ) -> Settings {
        for line in self.lines.drain(..) {
            let reply = match crate::config_dialogue::parse_command(&line) {
                Ok(command) => {
                    match crate::config_dialogue::apply_command(command, &mut settings, store, diag)
                    {
                        Ok(_) => Vec::from(&b"Ok\n"[..]),
                        Err(_) => Vec::from(&b"Error\n"[..]),
                    }
                }
                Err(_) => Vec::from(&b"Error\n"[..]),
            };
            self.transcript.push(reply);
        }
        settings
    }
}

/// A scripted [`crate::sampler::PortReader`]: replays a fixed sequence of
/// raw byte reads, one per call, then holds the line idle (`0xFF`)
/// forever. Lets property tests drive a channel with an exact byte-level
/// script without a real bit-banged transmitter.
pub struct ScriptedPort {
    reads: core::cell::RefCell<Vec<u8>>,
    cursor: core::cell::Cell<usize>,
}

impl ScriptedPort {
    pub fn new(reads: Vec<u8>) -> Self {
        ScriptedPort {
            reads: core::cell::RefCell::new(reads),
            cursor: core::cell::Cell::new(0),
        }
    }
}

impl crate::sampler::PortReader for ScriptedPort {
    fn read(&self) -> u8 {
        let reads = self.reads.borrow();
        let i = self.cursor.get();
        let value = reads.get(i).copied().unwrap_or(0xFF);
        self.cursor.set(i + 1);
        value
    }
}
