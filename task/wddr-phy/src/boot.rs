// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cold-boot sequencing.
//!
//! One linear pass from power-on to a PHY serving traffic under MC
//! control:
//!
//! 1. common analog up (bias, VREF, process-monitor reading);
//! 2. boot calibration (ZQCAL, sense-amp), results into the table;
//! 3. MCU VCO up, PLL interrupts on, FLL sweep of both PHY VCOs for
//!    every valid frequency;
//! 4. DRAM mode registers for the boot frequency through the command
//!    buffer;
//! 5. software-driven prep + switch onto the boot frequency, spinning on
//!    the PLL status CSR for lock (nothing else runs this early);
//! 6. hand switching to the DFI interface and lock out software
//!    switches.
//!
//! Boot is deliberately unbounded: there is no fallback if the silicon
//! never locks, so the watchdog discipline of the runtime paths does not
//! apply here.

use crate::phy::PhyDev;
use abi::{Msr, PhyError, VcoId, BOOT_FREQ_ID};
use drv_wddr_config::FREQ_COUNT;
use drv_wddr_dfi::command::ChipSelect;
use drv_wddr_fsw::FreqSwitchFsm;
use drv_wddr_irq::{sticky_mask, FastIrq, IrqRouter, StickyIrq};
use drv_wddr_regbus::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};
use userlib::hl;

/// Reference-clock window for the boot process-monitor reading.
const PMON_REFCLK_COUNT: u16 = 1000;

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    AnalogUp,
    Calibrated,
    VcosCalibrated,
    DramInit,
    BootSwitchDone,
    DfiModeEntered,
    Failed(PhyError),
}

ringbuf!(Trace, 16, Trace::None);

pub fn boot<B: RegisterBus + Copy, H: Copy>(
    phy: &mut PhyDev<B>,
    fsw_fsm: &mut FreqSwitchFsm,
    router: &IrqRouter<B, H>,
    calibrate: bool,
    _train_dram: bool,
) -> Result<(), PhyError> {
    let result = boot_inner(phy, fsw_fsm, router, calibrate);
    if let Err(e) = result {
        ringbuf_entry!(Trace::Failed(e));
    }
    result
}

fn boot_inner<B: RegisterBus + Copy, H: Copy>(
    phy: &mut PhyDev<B>,
    fsw_fsm: &mut FreqSwitchFsm,
    router: &IrqRouter<B, H>,
    calibrate: bool,
) -> Result<(), PhyError> {
    // Shared analog first; everything downstream needs bias and VREF.
    phy.cmn.init(&phy.table.common_cal);
    phy.cmn.pmon_run(PMON_REFCLK_COUNT);
    ringbuf_entry!(Trace::AnalogUp);

    if calibrate {
        phy.cmn.calibrate(&mut phy.table.common_cal)?;
        ringbuf_entry!(Trace::Calibrated);
    }

    // MCU VCO drives everything while the PHY VCOs are swept.
    phy.pll.boot();
    phy.pll.set_interrupts_enabled(true);

    for freq_id in 0..FREQ_COUNT as u8 {
        if !phy.table.is_valid(freq_id) {
            continue;
        }
        let table = &mut phy.table;
        let ndx = usize::from(freq_id);
        phy.pll
            .calibrate_vco(&table.cfg[ndx].pll, &mut table.cal[ndx].pll)?;
    }
    ringbuf_entry!(Trace::VcosCalibrated);

    // Mode registers for the boot operating point, both ranks.
    let cfg = phy.table.freq_cfg(BOOT_FREQ_ID)?.dram;
    let cal = phy.table.freq_cal(BOOT_FREQ_ID)?.dram;
    for cs in [ChipSelect::Cs0, ChipSelect::Cs1] {
        phy.dram.frequency_init(&phy.buffer, cs, &cfg, &cal)?;
    }
    ringbuf_entry!(Trace::DramInit);

    // Software-driven switch onto the boot frequency. The lock wait
    // polls the PLL status CSR directly: interrupts route through the
    // task loop, which is not running yet.
    let msr = phy.fsw.next_msr();
    fsw_fsm.event_prep(phy, BOOT_FREQ_ID, msr)?;
    fsw_fsm.event_sw_switch(phy)?;
    loop {
        let status = phy.pll.take_int_status();
        phy.pll_fsm.apply(status);
        if fsw_fsm.event_pll_locked(phy).is_some() {
            break;
        }
        hl::sleep_for(1);
    }
    ringbuf_entry!(Trace::BootSwitchDone);

    switch_to_dfi_mode(phy, router);
    fsw_fsm.event_hw_switch_mode()?;
    ringbuf_entry!(Trace::DfiModeEntered);
    Ok(())
}

/// Hands frequency switching to the DFI handshake: overrides released,
/// INIT pins back to hardware control, INIT interrupt lines quiesced and
/// unmasked for the runtime path.
fn switch_to_dfi_mode<B: RegisterBus + Copy, H: Copy>(
    phy: &mut PhyDev<B>,
    router: &IrqRouter<B, H>,
) {
    if phy.dfi_mode {
        return;
    }

    // Known override values before the hardware takes over.
    phy.fsw.set_msr_vco_override_val(Msr::Msr0, VcoId::PhyA);
    phy.fsw.set_msr_vco_override(false);

    // Release init_complete: the DFI interface is ready.
    phy.dfi.set_init_complete_override(false, false);

    // init_start must be observed low before its override goes.
    while phy.dfi.init_start_asserted() {}
    phy.dfi.set_init_start_override(false, false);

    let init_bits = sticky_mask(StickyIrq::InitStart)
        | sticky_mask(StickyIrq::InitComplete);
    router.disable_irq(FastIrq::InitStart);
    router.disable_irq(FastIrq::InitComplete);
    router.sticky_set_masked(init_bits, false);
    router.sticky_clear(init_bits);

    // MC update requests are honored from here on.
    phy.dfi.ctrlupd_set_enabled(true);

    phy.dfi_mode = true;
}
