// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The PHY device bundle.
//!
//! All the hardware the firmware task owns, in one struct so the state
//! machines can borrow it as a unit. [`PhyDev`] implements the seams the
//! machines sequence through: [`SwitchOps`] for the frequency-switch
//! choreography and (via [`Iocal`]) the IOCAL hooks for the update
//! machine.

use abi::{FreqId, Msr, PhyError, VcoId};
use drv_wddr_cmn::CmnDev;
use drv_wddr_config::{PhyTable, BOOT_TABLE};
use drv_wddr_dfi::update_fsm::IocalOps;
use drv_wddr_dfi::{dp, DfiBuffer, DfiIntf, DramDev};
use drv_wddr_fsw::{FswDev, SwitchOps};
use drv_wddr_pll::{PllDev, PllFsm};
use drv_wddr_regbus::RegisterBus;

pub struct PhyDev<B> {
    pub bus: B,
    pub table: PhyTable,
    pub pll: PllDev<B>,
    pub pll_fsm: PllFsm,
    pub fsw: FswDev<B>,
    pub dfi: DfiIntf<B>,
    pub buffer: DfiBuffer<B>,
    pub dram: DramDev,
    pub cmn: CmnDev<B>,
    /// Set once boot hands switching to the DFI interface; gates the
    /// init-complete release.
    pub dfi_mode: bool,
}

impl<B: RegisterBus + Copy> PhyDev<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            table: BOOT_TABLE.clone(),
            pll: PllDev::new(bus),
            pll_fsm: PllFsm::new(),
            fsw: FswDev::new(bus),
            dfi: DfiIntf::new(bus),
            buffer: DfiBuffer::new(bus),
            dram: DramDev::new(),
            cmn: CmnDev::new(bus),
            dfi_mode: false,
        }
    }

    pub fn current_freq(&self) -> Option<FreqId> {
        self.pll.current_freq()
    }

    pub fn current_vco(&self) -> Option<VcoId> {
        self.pll.current_vco()
    }
}

impl<B: RegisterBus + Copy> SwitchOps for PhyDev<B> {
    fn prep_phy(&mut self, freq_id: FreqId, msr: Msr) -> Result<(), PhyError> {
        let cfg = self.table.freq_cfg(freq_id)?;
        dp::prep_datapath(self.bus, msr, &cfg.dfi);
        self.fsw.prep_clock_stop(msr, &cfg.fsw);
        Ok(())
    }

    fn prep_pll(&mut self, freq_id: FreqId) -> Result<(), PhyError> {
        let cfg = self.table.freq_cfg(freq_id)?.pll;
        let cal = self.table.freq_cal(freq_id)?.pll;
        self.pll.prepare_vco_switch(freq_id, &cal, &cfg);
        Ok(())
    }

    fn switch_pll(&mut self, is_sw_switch: bool) -> Result<(), PhyError> {
        self.pll.switch_vco(is_sw_switch)?;
        // Hardware reports no loss-of-lock on a forced swap; reset the
        // lock tracking ourselves.
        self.pll_fsm.reset();
        Ok(())
    }

    fn pll_locked(&self) -> bool {
        self.pll_fsm.is_locked()
    }

    fn disable_previous_vco(&mut self) {
        self.pll.disable_previous();
    }

    fn init_complete(&mut self) {
        // Releasing the override lets the hardware raise INIT_COMPLETE to
        // the MC. Before the DFI handshake owns switching there is no MC
        // waiting on the pin.
        if self.dfi_mode {
            self.dfi.set_init_complete_override(false, false);
        }
    }
}

/// The IOCAL seam handed to the DFI update machine: recalibrate the
/// impedance codes, then drive them onto the pads.
pub struct Iocal<'a, B> {
    pub cmn: &'a CmnDev<B>,
    pub cal: &'a mut drv_wddr_config::CommonCal,
}

impl<B: RegisterBus + Copy> IocalOps for Iocal<'_, B> {
    fn calibrate(&mut self) {
        // A sweep that rails keeps the previous codes; the update still
        // applies something sane.
        let _ = self.cmn.zqcal.calibrate(&mut self.cal.zqcal);
    }

    fn update_phy(&mut self) {
        self.cmn.iocal_update_phy(self.cal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_wddr_fsw::regs as fsw_regs;
    use drv_wddr_regbus::FakeBus;

    #[test]
    fn prep_phy_touches_only_the_named_bank() {
        let bus = FakeBus::new();
        let mut phy = PhyDev::new(&bus);

        phy.prep_phy(1, Msr::Msr1).unwrap();
        assert_eq!(bus.get(abi::mem_map::DFICH0 + dp::regs::DP_M0_CFG), 0);
        assert_ne!(bus.get(abi::mem_map::DFICH0 + dp::regs::DP_M1_CFG), 0);
        assert_eq!(bus.get(abi::mem_map::FSW + fsw_regs::CSP_0_CFG), 0);
        assert_ne!(bus.get(abi::mem_map::FSW + fsw_regs::CSP_1_CFG), 0);
    }

    #[test]
    fn prep_phy_rejects_invalid_freq() {
        let bus = FakeBus::new();
        let mut phy = PhyDev::new(&bus);
        assert_eq!(
            phy.prep_phy(drv_wddr_config::FREQ_COUNT as u8, Msr::Msr0),
            Err(PhyError::InvalidFreq)
        );
    }

    #[test]
    fn init_complete_release_gated_on_dfi_mode() {
        let bus = FakeBus::new();
        let mut phy = PhyDev::new(&bus);

        // Pin held by software, as during boot.
        phy.dfi.set_init_complete_override(true, false);
        phy.init_complete();
        let v = bus.get(abi::mem_map::DFI + drv_wddr_dfi::intf::regs::STATUS_IF_CFG);
        assert_eq!(drv_wddr_dfi::intf::regs::INIT_COMPLETE_OVR.get(v), 1);

        phy.dfi_mode = true;
        phy.init_complete();
        let v = bus.get(abi::mem_map::DFI + drv_wddr_dfi::intf::regs::STATUS_IF_CFG);
        assert_eq!(drv_wddr_dfi::intf::regs::INIT_COMPLETE_OVR.get(v), 0);
    }
}
