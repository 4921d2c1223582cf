// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel fakes for host-side testing.
//!
//! These keep per-thread state so tests can run in parallel. The fakes are
//! deliberately non-blocking: `sys_recv_notification` returns the pending
//! subset immediately (possibly empty), and `sleep_for` advances the fake
//! clock instead of waiting. Tests that need a notification to arrive post
//! it first via [`test_support`].

use core::cell::Cell;

use crate::TimerState;

thread_local! {
    static CURRENT_TIME: Cell<u64> = Cell::new(0);
    static TIMER_SETTING: Cell<(Option<u64>, u32)> = Cell::default();
    static PENDING: Cell<u32> = Cell::new(0);
    static IRQ_ENABLED: Cell<u32> = Cell::new(0);
}

pub fn sys_get_timer() -> TimerState {
    let now = CURRENT_TIME.with(|t| t.get());
    let (deadline, on_dl) = TIMER_SETTING.with(|s| s.get());
    TimerState {
        now,
        deadline,
        on_dl,
    }
}

pub fn sys_set_timer(deadline: Option<u64>, notification: u32) {
    TIMER_SETTING.with(|s| s.set((deadline, notification)));
}

pub fn sys_recv_notification(mask: u32) -> u32 {
    // If the armed deadline has already passed, its notification counts as
    // posted. This is what lets timeout loops run to completion under test.
    let now = CURRENT_TIME.with(|t| t.get());
    TIMER_SETTING.with(|s| {
        if let (Some(dl), bits) = s.get() {
            if dl <= now {
                PENDING.with(|p| p.set(p.get() | bits));
                s.set((None, 0));
            }
        }
    });

    PENDING.with(|p| {
        let fired = p.get() & mask;
        p.set(p.get() & !fired);
        fired
    })
}

pub fn sys_post_notification(bits: u32) {
    PENDING.with(|p| p.set(p.get() | bits));
}

pub fn sys_irq_control(line: u32, enable: bool) {
    IRQ_ENABLED.with(|m| {
        if enable {
            m.set(m.get() | 1 << line);
        } else {
            m.set(m.get() & !(1 << line));
        }
    });
}

pub fn sys_irq_disable_all() {
    IRQ_ENABLED.with(|m| m.set(0));
}

pub fn sys_exit(cause: u32) -> ! {
    std::process::exit(cause as i32)
}

/// Knobs for tests: fake time control and kernel-state inspection.
pub mod test_support {
    use super::*;

    pub fn set_time(ms: u64) {
        CURRENT_TIME.with(|t| t.set(ms));
    }

    pub fn advance_time(ms: u64) {
        CURRENT_TIME.with(|t| t.set(t.get() + ms));
    }

    pub fn now() -> u64 {
        CURRENT_TIME.with(|t| t.get())
    }

    pub fn irq_enabled(line: u32) -> bool {
        IRQ_ENABLED.with(|m| m.get() & 1 << line != 0)
    }

    pub fn pending_notifications() -> u32 {
        PENDING.with(|p| p.get())
    }

    /// Clears all fake kernel state; call at the top of each test.
    pub fn reset() {
        CURRENT_TIME.with(|t| t.set(0));
        TIMER_SETTING.with(|s| s.set((None, 0)));
        PENDING.with(|p| p.set(0));
        IRQ_ENABLED.with(|m| m.set(0));
    }
}
