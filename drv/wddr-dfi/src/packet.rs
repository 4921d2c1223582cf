// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DFI command packets.
//!
//! The command buffer moves fixed-size packets of four 32-bit words. The
//! hardware scheduler holds each packet until its internal counter reaches
//! the packet's timestamp, then drives the encoded pin states for one DFI
//! cycle; a sequence is terminated by a packet that carries only a
//! timestamp, which marks the end of emission without driving the bus.
//!
//! Packet layout:
//!
//! ```text
//! word 0: [7:0]  timestamp      [9:8]  CKE   [11:10] CS   [12] DCE
//! word 1: four 6-bit CA frames at bits 0, 8, 16, 24
//! word 2: [0] wrdata_en  [1] rddata_en  [23:16] wrdata byte
//! word 3: reserved (reads back as captured DQ state on egress)
//! ```

use drv_wddr_regbus::Field;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Words per packet on both the ingress and egress sides.
pub const PACKET_WORDS: usize = 4;

/// Packets the hardware FIFO can hold.
pub const FIFO_DEPTH: usize = 64;

/// Command frames a single packet can carry.
pub const MAX_COMMAND_FRAMES: usize = 4;

const TIMESTAMP: Field = Field::new(0, 8);
const CKE: Field = Field::new(8, 2);
const CS: Field = Field::new(10, 2);
const DCE: Field = Field::bit(12);

const CA_FRAME_WIDTH: u32 = 6;
const CA_FRAME_STRIDE: u32 = 8;

const WRDATA_EN: Field = Field::bit(0);
const RDDATA_EN: Field = Field::bit(1);
const WRDATA: Field = Field::new(16, 8);

/// One ingress packet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TxPacket {
    pub raw: [u32; PACKET_WORDS],
}

impl TxPacket {
    /// A timestamp-only packet; as the last entry of a sequence it marks
    /// the end of emission.
    pub fn marker(timestamp: u8) -> Self {
        let mut p = Self::default();
        p.set_timestamp(timestamp);
        p
    }

    pub fn timestamp(&self) -> u8 {
        TIMESTAMP.get(self.raw[0]) as u8
    }

    pub fn set_timestamp(&mut self, ts: u8) {
        self.raw[0] = TIMESTAMP.set(self.raw[0], ts.into());
    }

    pub fn set_cke(&mut self, cke: u8) {
        self.raw[0] = CKE.set(self.raw[0], cke.into());
    }

    pub fn cke(&self) -> u8 {
        CKE.get(self.raw[0]) as u8
    }

    pub fn set_cs(&mut self, cs: u8) {
        self.raw[0] = CS.set(self.raw[0], cs.into());
    }

    pub fn cs(&self) -> u8 {
        CS.get(self.raw[0]) as u8
    }

    /// DRAM clock enable for the cycle this packet drives.
    pub fn set_dce(&mut self, on: bool) {
        self.raw[0] = DCE.set(self.raw[0], on as u32);
    }

    pub fn set_ca_frame(&mut self, ndx: usize, ca: u8) {
        debug_assert!(ndx < MAX_COMMAND_FRAMES);
        let f = Field::new(ndx as u32 * CA_FRAME_STRIDE, CA_FRAME_WIDTH);
        self.raw[1] = f.set(self.raw[1], ca.into());
    }

    pub fn ca_frame(&self, ndx: usize) -> u8 {
        debug_assert!(ndx < MAX_COMMAND_FRAMES);
        let f = Field::new(ndx as u32 * CA_FRAME_STRIDE, CA_FRAME_WIDTH);
        f.get(self.raw[1]) as u8
    }

    pub fn set_wrdata(&mut self, byte: u8) {
        self.raw[2] = WRDATA_EN.set(self.raw[2], 1);
        self.raw[2] = WRDATA.set(self.raw[2], byte.into());
    }

    pub fn set_rddata_en(&mut self, on: bool) {
        self.raw[2] = RDDATA_EN.set(self.raw[2], on as u32);
    }
}

/// One egress packet, as captured from the PHY side of the interface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RxPacket {
    pub raw: [u32; PACKET_WORDS],
}

impl RxPacket {
    pub fn timestamp(&self) -> u8 {
        TIMESTAMP.get(self.raw[0]) as u8
    }
}

/// A sequence of packets destined for the ingress FIFO, in emission order.
///
/// Timestamps must be strictly monotonic; `push` enforces it. `finish`
/// appends the terminating marker.
#[derive(Default)]
pub struct TxPacketSeq {
    packets: heapless::Vec<TxPacket, FIFO_DEPTH>,
}

impl TxPacketSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a packet. Returns the packet back if the sequence is full
    /// or the timestamp does not advance.
    pub fn push(&mut self, packet: TxPacket) -> Result<(), TxPacket> {
        if let Some(last) = self.packets.last() {
            if packet.timestamp() <= last.timestamp() {
                return Err(packet);
            }
        }
        self.packets.push(packet)
    }

    /// Appends the end-of-sequence marker, `gap` cycles after the last
    /// command.
    pub fn finish(&mut self, gap: u8) -> Result<(), TxPacket> {
        let ts = self
            .packets
            .last()
            .map(|p| p.timestamp().saturating_add(gap.max(1)))
            .unwrap_or(gap.max(1));
        self.push(TxPacket::marker(ts))
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TxPacket> {
        self.packets.iter()
    }

    pub fn last_timestamp(&self) -> Option<u8> {
        self.packets.last().map(|p| p.timestamp())
    }
}
