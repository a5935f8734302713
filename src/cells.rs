// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright NMEA Mux Contributors 2026.

//! Small `Cell`-based wrappers for state that is shared between the
//! scheduler and a component without either owning it outright.
//!
//! Everything here runs on one thread with cooperative, non-reentrant
//! scheduling (see [`crate::scheduler`]), so a plain [`core::cell::Cell`]
//! is enough: there is never a concurrent borrow to guard against, only
//! the occasional need to read or replace a value through a shared
//! reference instead of a mutable one.

use core::cell::Cell;

/// A `Cell<Option<T>>` with the small set of operations this crate
/// actually needs, named the way the value is used rather than exposing
/// the raw `Option` machinery everywhere.
pub struct OptionalCell<T> {
    value: Cell<Option<T>>,
}

impl<T: Copy> OptionalCell<T> {
    pub const fn empty() -> Self {
        OptionalCell {
            value: Cell::new(None),
        }
    }

    pub const fn new(value: T) -> Self {
        OptionalCell {
            value: Cell::new(Some(value)),
        }
    }

    pub fn is_some(&self) -> bool {
        // SAFETY-free: `Cell::get` requires `Copy`, which is why this type
        // is bounded on it rather than offering a `Clone`-based fallback.
        self.value.get().is_some()
    }

    pub fn get(&self) -> Option<T> {
        self.value.get()
    }

    pub fn set(&self, value: T) {
        self.value.set(Some(value));
    }

    pub fn clear(&self) {
        self.value.set(None);
    }

    pub fn take(&self) -> Option<T> {
        self.value.replace(None)
    }
}
