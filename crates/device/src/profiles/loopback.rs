//! Loopback test profile
//!
//! Minimal vendor-class device: bulk OUT payloads accumulate inside the
//! device and bulk IN drains them back in order. One vendor control
//! request reports how many bytes are pending. Used by the session tests
//! and selectable as a profile for protocol experiments.

use tracing::trace;

use protocol::{Direction, SetupPacket, TransferRequest};

use crate::descriptors::{Configuration, DeviceDescriptor, Endpoint, Interface};
use crate::error::Result;
use crate::handler::{ControlOutcome, UsbDevice};
use crate::model::DeviceModel;
use crate::strings::StringTable;

pub struct Loopback {
    model: DeviceModel,
    pending: Vec<u8>,
}

impl Loopback {
    /// Vendor IN request: reply with the pending byte count as a
    /// little-endian u32.
    pub const REQ_PENDING: u8 = 0x01;

    pub fn new() -> Result<Self> {
        let device = DeviceDescriptor {
            device_class: 0xFF,
            vendor_id: 0x1209,
            product_id: 0x0001,
            bcd_device: 0x0001,
            manufacturer_str: 1,
            product_str: 2,
            serial_str: 3,
            num_configurations: 1,
            ..Default::default()
        };

        let interface = Interface {
            number: 0,
            alternate_setting: 0,
            class: 0xFF,
            subclass: 0,
            protocol: 0,
            string_index: 0,
            class_descriptor: None,
            endpoints: vec![Endpoint::bulk(0x81, 64), Endpoint::bulk(0x01, 64)],
        };

        let configuration = Configuration {
            value: 1,
            string_index: 0,
            attributes: 0x80,
            max_power: 50,
            interfaces: vec![interface],
        };

        let strings = StringTable::default()
            .with(1, "usbip-emu")
            .with(2, "Loopback")
            .with(3, "0001");

        let model = DeviceModel::new(device, vec![configuration], strings)?;
        Ok(Self {
            model,
            pending: Vec::new(),
        })
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl UsbDevice for Loopback {
    fn model(&self) -> &DeviceModel {
        &self.model
    }

    fn handle_data(&mut self, request: &TransferRequest) -> Vec<u8> {
        match request.direction {
            Direction::Out => {
                trace!(len = request.payload.len(), "buffering OUT payload");
                self.pending.extend_from_slice(&request.payload);
                Vec::new()
            }
            Direction::In => {
                let take = (request.transfer_buffer_length as usize).min(self.pending.len());
                self.pending.drain(..take).collect()
            }
        }
    }

    fn handle_device_specific_control(
        &mut self,
        setup: &SetupPacket,
        _request: &TransferRequest,
    ) -> ControlOutcome {
        if setup.request_type == 0xC0 && setup.request == Self::REQ_PENDING {
            let count = self.pending.len() as u32;
            return ControlOutcome::Handled(count.to_le_bytes().to_vec());
        }
        ControlOutcome::Unsupported
    }
}
