// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-shot watchdog deadlines multiplexed over the single task timer.
//!
//! Each state machine in the firmware that blocks on an external
//! acknowledgement arms a watchdog on state entry and disarms it on state
//! exit. The kernel gives the task exactly one timer, so this type fans it
//! out: deadlines are keyed by an enum (derive `enum_map::Enum` for it),
//! the earliest armed deadline owns the hardware timer, and expirations
//! are latched until the task loop drains them with [`Multitimer::
//! take_fired`].
//!
//! A `Multitimer` assumes sole ownership of the task timer. `hl::sleep_for`
//! saves and restores the timer setting and so may be used alongside it.

#![cfg_attr(target_os = "none", no_std)]

use enum_map::{EnumArray, EnumMap};
use userlib::{sys_get_timer, sys_set_timer};

#[derive(Copy, Clone, Default)]
pub struct Timer {
    deadline: Option<u64>,
    fired: bool,
}

pub struct Multitimer<E: EnumArray<Timer>> {
    notification: u32,
    timers: EnumMap<E, Timer>,
}

impl<E: EnumArray<Timer> + Copy> Multitimer<E> {
    /// Creates the multiplexer over the notification bits the kernel will
    /// post when the task timer fires.
    pub fn new(notification: u32) -> Self {
        Self {
            notification,
            timers: EnumMap::default(),
        }
    }

    /// Arms `which` to expire at `deadline`, replacing any prior deadline
    /// for that timer. A pending unobserved expiration survives re-arming.
    pub fn arm(&mut self, which: E, deadline: u64) {
        self.timers[which].deadline = Some(deadline);
        self.update_system_timer();
    }

    /// Arms `which` to expire `interval` from now.
    pub fn arm_for(&mut self, which: E, interval: u64) {
        let now = sys_get_timer().now;
        self.arm(which, now.saturating_add(interval));
    }

    /// Disarms `which`, returning whether it had been armed. Any latched
    /// but unobserved expiration is discarded too: disarming means the
    /// awaited event arrived.
    pub fn disarm(&mut self, which: E) -> bool {
        let t = &mut self.timers[which];
        let was_armed = t.deadline.take().is_some();
        t.fired = false;
        if was_armed {
            self.update_system_timer();
        }
        was_armed
    }

    pub fn deadline(&self, which: E) -> Option<u64> {
        self.timers[which].deadline
    }

    /// Processes a timer notification, latching every deadline at or
    /// before the current time. Notifications that don't include our bits
    /// are ignored, so the task loop can feed every wakeup through here.
    pub fn handle_notification(&mut self, bits: u32) {
        if bits & self.notification == 0 {
            return;
        }
        let now = sys_get_timer().now;
        for timer in self.timers.values_mut() {
            if let Some(d) = timer.deadline {
                if d <= now {
                    timer.deadline = None;
                    timer.fired = true;
                }
            }
        }
        self.update_system_timer();
    }

    /// Drains the latched expirations, in enum declaration order.
    pub fn take_fired(&mut self) -> impl Iterator<Item = E> + '_ {
        self.timers.iter_mut().filter_map(|(e, timer)| {
            if core::mem::replace(&mut timer.fired, false) {
                Some(e)
            } else {
                None
            }
        })
    }

    fn update_system_timer(&mut self) {
        let earliest = self
            .timers
            .values()
            .filter_map(|t| t.deadline)
            .min();
        sys_set_timer(earliest, self.notification);
    }
}
