// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DFI handshake interface.
//!
//! The MC-facing request/acknowledge pins are driven through software
//! override registers: an `_OVR` bit hands the pin to software, a `_VAL`
//! bit sets its level. Requests are made by programming the request
//! parameters first and raising the value in a second write, so the MC
//! never samples a half-programmed request.

use abi::{mem_map, PhymstrReq, PhyupdType};
use drv_wddr_regbus::RegisterBus;

/// DFI block register map, relative to the block base.
pub mod regs {
    use drv_wddr_regbus::Field;

    pub const STATUS_IF_CFG: u32 = 0x00;
    pub const INIT_COMPLETE_OVR: Field = Field::bit(0);
    pub const INIT_COMPLETE_VAL: Field = Field::bit(1);
    pub const INIT_START_OVR: Field = Field::bit(4);
    pub const INIT_START_VAL: Field = Field::bit(5);

    pub const STATUS_IF_STA: u32 = 0x04;
    pub const STA_INIT_START: Field = Field::bit(0);

    pub const PHYMSTR_IF_CFG: u32 = 0x10;
    pub const PHYMSTR_SW_TYPE: Field = Field::new(0, 2);
    pub const PHYMSTR_SW_CS_STATE: Field = Field::new(4, 2);
    pub const PHYMSTR_SW_STATE_SEL: Field = Field::bit(8);
    pub const PHYMSTR_SW_REQ_OVR: Field = Field::bit(12);
    pub const PHYMSTR_SW_REQ_VAL: Field = Field::bit(13);
    pub const PHYMSTR_SW_EVENT_OVR: Field = Field::bit(16);
    pub const PHYMSTR_SW_EVENT_VAL: Field = Field::bit(17);

    pub const PHYMSTR_IF_STA: u32 = 0x14;
    pub const PHYMSTR_STA_ACK: Field = Field::bit(0);

    pub const PHYUPD_IF_CFG: u32 = 0x20;
    pub const PHYUPD_SW_TYPE: Field = Field::new(0, 2);
    pub const PHYUPD_SW_REQ_OVR: Field = Field::bit(4);
    pub const PHYUPD_SW_REQ_VAL: Field = Field::bit(5);
    pub const PHYUPD_SW_EVENT_OVR: Field = Field::bit(8);
    pub const PHYUPD_SW_EVENT_VAL: Field = Field::bit(9);

    pub const PHYUPD_IF_STA: u32 = 0x24;
    pub const PHYUPD_STA_ACK: Field = Field::bit(0);

    pub const CTRLUPD_IF_CFG: u32 = 0x30;
    pub const CTRLUPD_IF_EN: Field = Field::bit(0);
    pub const CTRLUPD_SW_ACK_OVR: Field = Field::bit(4);
    pub const CTRLUPD_SW_ACK_VAL: Field = Field::bit(5);

    pub const CTRLUPD_IF_STA: u32 = 0x34;
    pub const CTRLUPD_STA_REQ: Field = Field::bit(0);
}

pub struct DfiIntf<B> {
    bus: B,
    base: u32,
}

impl<B: RegisterBus + Copy> DfiIntf<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            base: mem_map::DFI,
        }
    }

    // INIT_START / INIT_COMPLETE -------------------------------------

    /// Takes or releases software control of `INIT_COMPLETE`. Releasing
    /// with the override cleared lets the hardware drive the pin.
    pub fn set_init_complete_override(&self, enable: bool, value: bool) {
        let addr = self.base + regs::STATUS_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::INIT_COMPLETE_OVR.set(v, enable as u32);
        v = regs::INIT_COMPLETE_VAL.set(v, value as u32);
        self.bus.write32(addr, v);
    }

    pub fn set_init_start_override(&self, enable: bool, value: bool) {
        let addr = self.base + regs::STATUS_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::INIT_START_OVR.set(v, enable as u32);
        v = regs::INIT_START_VAL.set(v, value as u32);
        self.bus.write32(addr, v);
    }

    pub fn init_start_asserted(&self) -> bool {
        self.bus
            .read_field(self.base + regs::STATUS_IF_STA, regs::STA_INIT_START)
            != 0
    }

    // PHYMSTR --------------------------------------------------------

    /// Raises `PHYMSTR_REQ` with the request parameters. Parameters land
    /// in the first write, the request value in the second.
    pub fn phymstr_req(&self, req: &PhymstrReq) {
        let addr = self.base + regs::PHYMSTR_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::PHYMSTR_SW_TYPE.set(v, req.ty as u32);
        v = regs::PHYMSTR_SW_CS_STATE.set(v, req.cs_state.into());
        v = regs::PHYMSTR_SW_STATE_SEL.set(v, req.state_sel as u32);
        v = regs::PHYMSTR_SW_REQ_OVR.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::PHYMSTR_SW_REQ_VAL.set(v, 1);
        self.bus.write32(addr, v);
    }

    /// Deasserts `PHYMSTR_REQ` with the "event done" pulse and waits for
    /// the MC to drop the acknowledge.
    pub fn phymstr_exit(&self) {
        let addr = self.base + regs::PHYMSTR_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::PHYMSTR_SW_REQ_VAL.set(v, 0);
        self.bus.write32(addr, v);
        v = regs::PHYMSTR_SW_EVENT_OVR.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::PHYMSTR_SW_EVENT_VAL.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::PHYMSTR_SW_REQ_OVR.set(v, 0);
        v = regs::PHYMSTR_SW_TYPE.set(v, 0);
        v = regs::PHYMSTR_SW_CS_STATE.set(v, 0);
        v = regs::PHYMSTR_SW_STATE_SEL.set(v, 0);
        self.bus.write32(addr, v);
        v = regs::PHYMSTR_SW_EVENT_VAL.set(v, 0);
        self.bus.write32(addr, v);
        v = regs::PHYMSTR_SW_EVENT_OVR.set(v, 0);
        self.bus.write32(addr, v);

        // ACK must be observed low before the FSM may go idle.
        while self.phymstr_ack_asserted() {}
    }

    pub fn phymstr_ack_asserted(&self) -> bool {
        self.bus
            .read_field(self.base + regs::PHYMSTR_IF_STA, regs::PHYMSTR_STA_ACK)
            != 0
    }

    // PHYUPD ---------------------------------------------------------

    pub fn phyupd_req(&self, ty: PhyupdType) {
        let addr = self.base + regs::PHYUPD_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::PHYUPD_SW_TYPE.set(v, ty as u32);
        v = regs::PHYUPD_SW_REQ_OVR.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::PHYUPD_SW_REQ_VAL.set(v, 1);
        self.bus.write32(addr, v);
    }

    /// Deasserts `PHYUPD_REQ` after the update and waits for ACK low.
    pub fn phyupd_exit(&self) {
        let addr = self.base + regs::PHYUPD_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::PHYUPD_SW_REQ_VAL.set(v, 0);
        self.bus.write32(addr, v);
        v = regs::PHYUPD_SW_EVENT_OVR.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::PHYUPD_SW_EVENT_VAL.set(v, 1);
        self.bus.write32(addr, v);
        v = regs::PHYUPD_SW_TYPE.set(v, 0);
        v = regs::PHYUPD_SW_REQ_OVR.set(v, 0);
        self.bus.write32(addr, v);
        v = regs::PHYUPD_SW_EVENT_VAL.set(v, 0);
        self.bus.write32(addr, v);
        v = regs::PHYUPD_SW_EVENT_OVR.set(v, 0);
        self.bus.write32(addr, v);

        while self.phyupd_ack_asserted() {}
    }

    pub fn phyupd_ack_asserted(&self) -> bool {
        self.bus
            .read_field(self.base + regs::PHYUPD_IF_STA, regs::PHYUPD_STA_ACK)
            != 0
    }

    // CTRLUPD --------------------------------------------------------

    /// Allows or blocks MC CTRLUPD requests from reaching the PHY.
    pub fn ctrlupd_set_enabled(&self, enable: bool) {
        self.bus.set_bit(
            self.base + regs::CTRLUPD_IF_CFG,
            regs::CTRLUPD_IF_EN,
            enable,
        );
    }

    /// Drives `CTRLUPD_ACK` through its software override.
    pub fn ctrlupd_ack(&self, assert: bool) {
        let addr = self.base + regs::CTRLUPD_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::CTRLUPD_SW_ACK_OVR.set(v, 1);
        v = regs::CTRLUPD_SW_ACK_VAL.set(v, assert as u32);
        self.bus.write32(addr, v);
    }

    /// Returns the ACK override to the hardware.
    pub fn ctrlupd_ack_release(&self) {
        let addr = self.base + regs::CTRLUPD_IF_CFG;
        let mut v = self.bus.read32(addr);
        v = regs::CTRLUPD_SW_ACK_OVR.set(v, 0);
        v = regs::CTRLUPD_SW_ACK_VAL.set(v, 0);
        self.bus.write32(addr, v);
    }

    pub fn ctrlupd_req_asserted(&self) -> bool {
        self.bus
            .read_field(self.base + regs::CTRLUPD_IF_STA, regs::CTRLUPD_STA_REQ)
            != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi::{PhymstrStateSel, PhymstrType};
    use drv_wddr_regbus::FakeBus;

    #[test]
    fn phymstr_req_parameters_land_before_request() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);

        intf.phymstr_req(&PhymstrReq {
            ty: PhymstrType::Type1,
            state_sel: PhymstrStateSel::Refresh,
            cs_state: 0b10,
        });

        let writes = bus.writes();
        assert_eq!(writes.len(), 2);
        let first = writes[0].1;
        assert_eq!(regs::PHYMSTR_SW_TYPE.get(first), 1);
        assert_eq!(regs::PHYMSTR_SW_CS_STATE.get(first), 0b10);
        assert_eq!(regs::PHYMSTR_SW_STATE_SEL.get(first), 1);
        assert_eq!(regs::PHYMSTR_SW_REQ_OVR.get(first), 1);
        // REQ_VAL only rises in the second write.
        assert_eq!(regs::PHYMSTR_SW_REQ_VAL.get(first), 0);
        assert_eq!(regs::PHYMSTR_SW_REQ_VAL.get(writes[1].1), 1);
    }

    #[test]
    fn phymstr_exit_clears_everything() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);

        intf.phymstr_req(&PhymstrReq {
            ty: PhymstrType::Type0,
            state_sel: PhymstrStateSel::Idle,
            cs_state: 0,
        });
        intf.phymstr_exit();

        let v = bus.get(mem_map::DFI + regs::PHYMSTR_IF_CFG);
        assert_eq!(v, 0);
    }

    #[test]
    fn init_complete_release_sequence() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);

        intf.set_init_complete_override(true, false);
        let v = bus.get(mem_map::DFI + regs::STATUS_IF_CFG);
        assert_eq!(regs::INIT_COMPLETE_OVR.get(v), 1);
        assert_eq!(regs::INIT_COMPLETE_VAL.get(v), 0);

        intf.set_init_complete_override(false, false);
        assert_eq!(bus.get(mem_map::DFI + regs::STATUS_IF_CFG), 0);
    }

    #[test]
    fn ctrlupd_ack_override_and_release() {
        let bus = FakeBus::new();
        let intf = DfiIntf::new(&bus);

        intf.ctrlupd_set_enabled(true);
        intf.ctrlupd_ack(true);
        let v = bus.get(mem_map::DFI + regs::CTRLUPD_IF_CFG);
        assert_eq!(regs::CTRLUPD_SW_ACK_OVR.get(v), 1);
        assert_eq!(regs::CTRLUPD_SW_ACK_VAL.get(v), 1);
        assert_eq!(regs::CTRLUPD_IF_EN.get(v), 1);

        intf.ctrlupd_ack_release();
        let v = bus.get(mem_map::DFI + regs::CTRLUPD_IF_CFG);
        assert_eq!(regs::CTRLUPD_SW_ACK_OVR.get(v), 0);
        assert_eq!(regs::CTRLUPD_IF_EN.get(v), 1);
    }
}
