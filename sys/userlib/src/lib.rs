// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the kernel from firmware tasks.
//!
//! The kernel itself is out of tree; on target builds these wrappers bind
//! the exported kernel entry points. On host builds (`cargo test` on the
//! build machine) each entry point is replaced by a deterministic fake so
//! drivers and the firmware task can be unit-tested without hardware.

#![cfg_attr(target_os = "none", no_std)]

pub use abi::*;
pub use num_derive::{FromPrimitive, ToPrimitive};
pub use num_traits::{FromPrimitive, ToPrimitive};
pub use unwrap_lite::UnwrapLite;

/// Snapshot of the task timer.
#[derive(Copy, Clone, Debug)]
pub struct TimerState {
    /// Current time, in milliseconds since kernel start.
    pub now: u64,
    /// Currently armed deadline, if any.
    pub deadline: Option<u64>,
    /// Notification bits that will post when the deadline fires.
    pub on_dl: u32,
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        mod kern {
            extern "C" {
                pub fn _krn_time_now() -> u64;
                pub fn _krn_timer_deadline() -> u64;
                pub fn _krn_timer_notification() -> u32;
                pub fn _krn_set_timer(armed: bool, deadline: u64, notification: u32);
                pub fn _krn_recv_notification(mask: u32) -> u32;
                pub fn _krn_post_notification(bits: u32);
                pub fn _krn_irq_control(line: u32, enable: bool);
                pub fn _krn_irq_disable_all();
                pub fn _exit(cause: u32) -> !;
            }
        }

        pub fn sys_get_timer() -> TimerState {
            // Deadline of !0 encodes "not armed" at the kernel boundary.
            let (now, dl, on_dl) = unsafe {
                (
                    kern::_krn_time_now(),
                    kern::_krn_timer_deadline(),
                    kern::_krn_timer_notification(),
                )
            };
            TimerState {
                now,
                deadline: if dl == !0 { None } else { Some(dl) },
                on_dl,
            }
        }

        pub fn sys_set_timer(deadline: Option<u64>, notification: u32) {
            unsafe {
                kern::_krn_set_timer(
                    deadline.is_some(),
                    deadline.unwrap_or(!0),
                    notification,
                );
            }
        }

        /// Blocks until at least one notification bit in `mask` posts;
        /// returns and clears the posted subset.
        pub fn sys_recv_notification(mask: u32) -> u32 {
            unsafe { kern::_krn_recv_notification(mask) }
        }

        /// Posts notification bits to the firmware task. Safe from any
        /// context, including interrupt handlers.
        pub fn sys_post_notification(bits: u32) {
            unsafe { kern::_krn_post_notification(bits) }
        }

        /// Enables or disables a hardware interrupt line routed to this
        /// task as a notification.
        pub fn sys_irq_control(line: u32, enable: bool) {
            unsafe { kern::_krn_irq_control(line, enable) }
        }

        pub fn sys_irq_disable_all() {
            unsafe { kern::_krn_irq_disable_all() }
        }

        /// Terminates the firmware with a numbered cause. Interrupts must
        /// already be disabled; the kernel does not return.
        pub fn sys_exit(cause: u32) -> ! {
            unsafe { kern::_exit(cause) }
        }

        /// Assertion failures (cause 4) end the firmware with interrupts
        /// off, like every other fatal condition.
        #[panic_handler]
        fn panic(_info: &core::panic::PanicInfo<'_>) -> ! {
            sys_irq_disable_all();
            sys_exit(4)
        }
    } else {
        mod fakes;
        pub use fakes::{
            sys_get_timer, sys_set_timer, sys_recv_notification,
            sys_post_notification, sys_irq_control, sys_irq_disable_all,
            sys_exit,
        };
        pub use fakes::test_support;
    }
}

/// Convenience layer over the raw timer interface.
pub mod hl {
    use super::*;

    /// Notification bit reserved for `sleep_for` waits.
    pub const SLEEP_NOTIFICATION: u32 = 1 << 31;

    /// Sleeps for at least `ms` milliseconds, preserving any armed timer.
    /// On host builds this advances the fake clock instead of blocking, so
    /// polling loops with deadlines make progress under test.
    pub fn sleep_for(ms: u64) {
        let prior = sys_get_timer();
        let wake = prior.now + ms;
        sys_set_timer(Some(wake), SLEEP_NOTIFICATION);

        #[cfg(not(target_os = "none"))]
        test_support::advance_time(ms);

        sys_recv_notification(SLEEP_NOTIFICATION);
        // Put back whatever deadline we displaced.
        sys_set_timer(prior.deadline, prior.on_dl);
    }
}
