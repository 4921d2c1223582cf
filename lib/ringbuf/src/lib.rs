// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static ring buffers for tracing firmware behavior.
//!
//! A ring buffer is declared once per module with [`ringbuf!`], naming the
//! entry type (which must be `Copy + PartialEq`), the entry count, and an
//! initializer:
//!
//! ```ignore
//! ringbuf!(Trace, 64, Trace::None);
//! ```
//!
//! Entries are recorded with [`ringbuf_entry!`]:
//!
//! ```ignore
//! ringbuf_entry!(Trace::SwitchDone(freq_id));
//! ```
//!
//! Each entry records the source line and a generation counter, and an
//! entry identical to the previous one (same line, same payload) bumps a
//! repeat count instead of consuming a slot, so a stuck polling loop does
//! not erase history. The buffers are plain statics, sized at declaration;
//! they are read post-mortem through the debugger rather than streamed
//! anywhere.

#![cfg_attr(target_os = "none", no_std)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// A single recorded entry.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy> {
    pub line: u16,
    pub generation: u16,
    pub count: u16,
    pub payload: T,
}

/// Fixed-size ring of entries plus a cursor to the most recent one.
#[derive(Debug)]
pub struct Ringbuf<T: Copy, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub fn record(&mut self, line: u16, payload: T) {
        // Identical back-to-back entries collapse into a repeat count
        // until the count saturates.
        if let Some(last) = self.last {
            let ent = &mut self.buffer[last];
            if ent.line == line && ent.payload == payload && ent.count < u16::MAX
            {
                ent.count += 1;
                return;
            }
        }

        let ndx = match self.last {
            Some(last) if last + 1 < N => last + 1,
            _ => 0,
        };
        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            generation: ent.generation.wrapping_add(1),
            count: 1,
            payload,
        };
        self.last = Some(ndx);
    }
}

/// Wrapper making a `Ringbuf` usable as a `static`. Access is guarded by a
/// claim flag; a recording attempted while another is in progress (which
/// cannot happen from the single firmware task, but can from parallel test
/// threads) is silently dropped rather than blocking.
pub struct StaticRingbuf<T: Copy, const N: usize> {
    cell: UnsafeCell<Ringbuf<T, N>>,
    claimed: AtomicBool,
}

unsafe impl<T: Copy, const N: usize> Sync for StaticRingbuf<T, N> {}

impl<T: Copy + PartialEq, const N: usize> StaticRingbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            cell: UnsafeCell::new(Ringbuf {
                last: None,
                buffer: [RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: init,
                }; N],
            }),
            claimed: AtomicBool::new(false),
        }
    }

    pub fn record_entry(&self, line: u16, payload: T) {
        if self.claimed.swap(true, Ordering::Acquire) {
            return;
        }
        // Claim flag held: no other reference to the contents exists.
        unsafe { (*self.cell.get()).record(line, payload) };
        self.claimed.store(false, Ordering::Release);
    }

    /// Snapshot for tests and post-mortem tooling.
    pub fn with<R>(&self, body: impl FnOnce(&Ringbuf<T, N>) -> R) -> Option<R> {
        if self.claimed.swap(true, Ordering::Acquire) {
            return None;
        }
        let r = body(unsafe { &*self.cell.get() });
        self.claimed.store(false, Ordering::Release);
        Some(r)
    }
}

/// Declares a ring buffer in the current module.
///
/// `ringbuf!(NAME, Type, N, expr)` declares a static named `NAME`; the
/// name defaults to `__RINGBUF` when omitted, which supports the common
/// one-buffer-per-module case.
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        static $name: $crate::StaticRingbuf<$t, $n> =
            $crate::StaticRingbuf::new($init);
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Records an entry in a ring buffer declared with [`ringbuf!`]. With one
/// argument, records into the module's unnamed (`__RINGBUF`) buffer.
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate payload and buffer in a tuple so neither can
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &$buf);
        $crate::StaticRingbuf::record_entry(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}
