// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PLL lock-state machine.
//!
//! Driven by the three PLL core interrupts. `init_locked` means the
//! frequency-locked stage finished after a VCO switch; `locked` means full
//! phase lock. Hardware does not report loss-of-lock when software forces
//! a VCO swap, so the switch path resets the machine explicitly.

use crate::PllIntStatus;
use ringbuf::{ringbuf, ringbuf_entry};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PllState {
    NotLocked,
    InitLocked,
    Locked,
}

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Reset,
    Transition(PllState),
    InitLockIgnored(PllState),
}

ringbuf!(Trace, 16, Trace::None);

pub struct PllFsm {
    state: PllState,
}

impl PllFsm {
    pub fn new() -> Self {
        Self {
            state: PllState::NotLocked,
        }
    }

    pub fn state(&self) -> PllState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == PllState::Locked
    }

    /// Software reset issued around a forced VCO swap.
    pub fn reset(&mut self) {
        ringbuf_entry!(Trace::Reset);
        self.state = PllState::NotLocked;
    }

    /// Applies one latched interrupt status word.
    ///
    /// Several bits can be set in a single read; loss-of-lock beats
    /// core-locked beats initial-switch-done, which resolves the only
    /// ordering that matters when events pile up behind one interrupt.
    pub fn apply(&mut self, status: PllIntStatus) {
        let next = if status.contains(PllIntStatus::LOSS_OF_LOCK) {
            Some(PllState::NotLocked)
        } else if status.contains(PllIntStatus::CORE_LOCKED) {
            Some(PllState::Locked)
        } else if status.contains(PllIntStatus::INITIAL_SWITCH_DONE) {
            // Guard: initial lock is only meaningful out of NotLocked;
            // a stale FLL-done bit must not demote a locked PLL.
            if self.state == PllState::NotLocked {
                Some(PllState::InitLocked)
            } else {
                ringbuf_entry!(Trace::InitLockIgnored(self.state));
                None
            }
        } else {
            None
        };

        if let Some(next) = next {
            ringbuf_entry!(Trace::Transition(next));
            self.state = next;
        }
    }
}

impl Default for PllFsm {
    fn default() -> Self {
        Self::new()
    }
}
