//! Portable SSD mass-storage profile
//!
//! Emulates a Samsung Portable SSD T5 at the descriptor level: one
//! configuration whose single interface offers Bulk-Only Transport as
//! alternate setting 0 and UAS as alternate setting 1, with the UAS
//! endpoints carrying pipe-usage class descriptors. SCSI command
//! interpretation is not emulated; bulk traffic is acknowledged empty and
//! class/vendor control requests are reported unsupported.

use tracing::{debug, warn};

use protocol::{SetupPacket, TransferRequest};

use crate::descriptors::{Configuration, DeviceDescriptor, Endpoint, Interface};
use crate::error::Result;
use crate::handler::{ControlOutcome, UsbDevice};
use crate::model::DeviceModel;
use crate::strings::{LANG_EN_US, StringTable};

const VENDOR_SAMSUNG: u16 = 0x04e8;
const PRODUCT_T5: u16 = 0x61f6;

/// Pipe usage class-specific descriptor (UAS, T10/2095-D).
fn pipe_usage(pipe_id: u8) -> Vec<u8> {
    vec![0x04, 0x24, 0x00, pipe_id]
}

pub struct PortableSsd {
    model: DeviceModel,
}

impl PortableSsd {
    pub fn new() -> Result<Self> {
        let device = DeviceDescriptor {
            bcd_usb: 0x0110,
            max_packet_size0: 0x40,
            vendor_id: VENDOR_SAMSUNG,
            product_id: PRODUCT_T5,
            bcd_device: 0x0100,
            manufacturer_str: 2,
            product_str: 3,
            serial_str: 1,
            num_configurations: 1,
            ..Default::default()
        };

        // Bulk-Only Transport: SCSI transparent command set over two bulk
        // endpoints.
        let bot = Interface {
            number: 0,
            alternate_setting: 0,
            class: 0x08,
            subclass: 0x06,
            protocol: 0x50,
            string_index: 0,
            class_descriptor: None,
            endpoints: vec![Endpoint::bulk(0x81, 512), Endpoint::bulk(0x02, 512)],
        };

        // USB Attached SCSI: four bulk pipes tagged by usage id.
        let uas = Interface {
            number: 0,
            alternate_setting: 1,
            class: 0x08,
            subclass: 0x06,
            protocol: 0x62,
            string_index: 0,
            class_descriptor: None,
            endpoints: vec![
                Endpoint::bulk(0x81, 512).with_class_descriptor(pipe_usage(0x03)),
                Endpoint::bulk(0x02, 512).with_class_descriptor(pipe_usage(0x04)),
                Endpoint::bulk(0x83, 512).with_class_descriptor(pipe_usage(0x02)),
                Endpoint::bulk(0x04, 512).with_class_descriptor(pipe_usage(0x01)),
            ],
        };

        let configuration = Configuration {
            value: 1,
            string_index: 0,
            attributes: 0x80,
            max_power: 250,
            interfaces: vec![bot, uas],
        };

        let strings = StringTable::new(vec![LANG_EN_US])
            .with(1, "0123456789AB")
            .with(2, "Samsung")
            .with(3, "Portable SSD T5");

        let model = DeviceModel::new(device, vec![configuration], strings)?;
        Ok(Self { model })
    }
}

impl UsbDevice for PortableSsd {
    fn model(&self) -> &DeviceModel {
        &self.model
    }

    fn handle_data(&mut self, request: &TransferRequest) -> Vec<u8> {
        warn!(
            ep = request.ep,
            len = request.payload.len(),
            "SCSI transport is not emulated, acknowledging empty"
        );
        Vec::new()
    }

    fn handle_device_specific_control(
        &mut self,
        setup: &SetupPacket,
        _request: &TransferRequest,
    ) -> ControlOutcome {
        debug!(
            request_type = setup.request_type,
            request = setup.request,
            "class/vendor control request not recognized"
        );
        ControlOutcome::Unsupported
    }
}
