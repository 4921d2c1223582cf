// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register bus for the WDDR PHY CSR space.
//!
//! Every hardware access in the firmware goes through a [`RegisterBus`]
//! value. On target there is exactly one implementation, [`Mmio`], claimed
//! once at startup and handed to the firmware task; treating the bus as a
//! capability rather than free functions is what keeps CSR mutation
//! serialized to that task. Host builds get [`FakeBus`], a flat register
//! map, so driver logic tests run on the build machine.
//!
//! Register maps live with the drivers that own each block; this crate
//! only knows about 32-bit registers and bit fields within them.

#![cfg_attr(target_os = "none", no_std)]

/// A bit field within a 32-bit register: a shift and an already-shifted
/// mask. Declared `const` in each driver's register map.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub shift: u32,
    pub mask: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Self {
            shift,
            mask: ((1 << width) - 1) << shift,
        }
    }

    /// A single-bit field.
    pub const fn bit(shift: u32) -> Self {
        Self::new(shift, 1)
    }

    #[inline(always)]
    pub fn get(&self, reg: u32) -> u32 {
        (reg & self.mask) >> self.shift
    }

    #[inline(always)]
    pub fn set(&self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask) | ((value << self.shift) & self.mask)
    }
}

/// 32-bit MMIO primitives plus the derived field operations.
pub trait RegisterBus {
    fn read32(&self, addr: u32) -> u32;
    fn write32(&self, addr: u32, value: u32);

    /// Read-modify-write of one field.
    fn modify_field(&self, addr: u32, shift: u32, mask: u32, value: u32) {
        let reg = self.read32(addr);
        self.write32(addr, (reg & !mask) | ((value << shift) & mask));
    }

    fn read_field(&self, addr: u32, field: Field) -> u32 {
        field.get(self.read32(addr))
    }

    fn modify(&self, addr: u32, field: Field, value: u32) {
        self.modify_field(addr, field.shift, field.mask, value);
    }

    fn set_bit(&self, addr: u32, field: Field, on: bool) {
        self.modify(addr, field, on as u32);
    }
}

/// Shared references forward, so drivers can hold `&FakeBus` in tests and
/// the zero-sized `Mmio` by value on target.
impl<B: RegisterBus> RegisterBus for &B {
    fn read32(&self, addr: u32) -> u32 {
        (*self).read32(addr)
    }

    fn write32(&self, addr: u32, value: u32) {
        (*self).write32(addr, value)
    }
}

#[cfg(target_os = "none")]
mod mmio {
    use core::sync::atomic::{fence, AtomicBool, Ordering};

    static CLAIMED: AtomicBool = AtomicBool::new(false);

    /// The real bus. Zero-sized; holding one is the capability to touch
    /// CSR space.
    #[derive(Copy, Clone)]
    pub struct Mmio(());

    impl Mmio {
        /// Claims the bus. Panics on a second claim; the firmware task is
        /// the only intended holder.
        pub fn claim() -> Mmio {
            if CLAIMED.swap(true, Ordering::SeqCst) {
                panic!();
            }
            Mmio(())
        }
    }

    impl super::RegisterBus for Mmio {
        fn read32(&self, addr: u32) -> u32 {
            // Fences order CSR access against IRQ entry/exit on this
            // single-hart MCU.
            fence(Ordering::SeqCst);
            let v = unsafe { core::ptr::read_volatile(addr as *const u32) };
            fence(Ordering::SeqCst);
            v
        }

        fn write32(&self, addr: u32, value: u32) {
            fence(Ordering::SeqCst);
            unsafe { core::ptr::write_volatile(addr as *mut u32, value) };
            fence(Ordering::SeqCst);
        }
    }
}

#[cfg(target_os = "none")]
pub use mmio::Mmio;

#[cfg(not(target_os = "none"))]
mod fake {
    use core::cell::RefCell;
    use std::collections::BTreeMap;

    /// Flat register map standing in for the CSR space in host tests.
    ///
    /// Unwritten registers read as zero, like the hardware after reset.
    /// Tests preload status registers with [`FakeBus::load`] to satisfy
    /// the polling loops in the drivers.
    #[derive(Default)]
    pub struct FakeBus {
        regs: RefCell<BTreeMap<u32, u32>>,
        writes: RefCell<Vec<(u32, u32)>>,
    }

    impl FakeBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// Preloads a register value without recording a write.
        pub fn load(&self, addr: u32, value: u32) {
            self.regs.borrow_mut().insert(addr, value);
        }

        pub fn get(&self, addr: u32) -> u32 {
            self.regs.borrow().get(&addr).copied().unwrap_or(0)
        }

        /// Every `write32` in program order, for asserting exact register
        /// sequences.
        pub fn writes(&self) -> Vec<(u32, u32)> {
            self.writes.borrow().clone()
        }

        pub fn write_count(&self) -> usize {
            self.writes.borrow().len()
        }
    }

    impl super::RegisterBus for FakeBus {
        fn read32(&self, addr: u32) -> u32 {
            self.get(addr)
        }

        fn write32(&self, addr: u32, value: u32) {
            self.regs.borrow_mut().insert(addr, value);
            self.writes.borrow_mut().push((addr, value));
        }
    }
}

#[cfg(not(target_os = "none"))]
pub use fake::FakeBus;
