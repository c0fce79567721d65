//! Device registry
//!
//! Explicit registry constructed once in `main` and passed by reference
//! into the session engine; there is no process-wide device list. The
//! engine exports the first registered device — one device is active at
//! a time.

use device::UsbDevice;
use protocol::{DeviceListReply, ExportedDevice, ImportReply, InterfaceSummary};

use crate::config::ExportSettings;

pub struct DeviceRegistry {
    export: ExportSettings,
    devices: Vec<Box<dyn UsbDevice>>,
}

impl DeviceRegistry {
    pub fn new(export: ExportSettings) -> Self {
        Self {
            export,
            devices: Vec::new(),
        }
    }

    pub fn register(&mut self, device: Box<dyn UsbDevice>) {
        self.devices.push(device);
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The active (first registered) device.
    pub fn active_mut(&mut self) -> Option<&mut (dyn UsbDevice + '_)> {
        match self.devices.first_mut() {
            Some(device) => Some(&mut **device),
            None => None,
        }
    }

    /// Bus identity plus descriptor summary of the exported device, as
    /// reported in both handshake replies.
    fn exported_device(&self) -> Option<ExportedDevice> {
        let model = self.devices.first()?.model();
        let descriptor = model.device_descriptor();
        let configuration = model.configurations().first()?;
        Some(ExportedDevice {
            usb_path: self.export.usb_path.clone(),
            bus_id: self.export.bus_id.clone(),
            busnum: self.export.busnum,
            devnum: self.export.devnum,
            speed: self.export.speed,
            id_vendor: descriptor.vendor_id,
            id_product: descriptor.product_id,
            bcd_device: descriptor.bcd_device,
            device_class: descriptor.device_class,
            device_subclass: descriptor.device_subclass,
            device_protocol: descriptor.device_protocol,
            configuration_value: configuration.value,
            num_configurations: descriptor.num_configurations,
            num_interfaces: model.num_interfaces(0),
        })
    }

    pub fn device_list_reply(&self) -> Option<DeviceListReply> {
        let device = self.exported_device()?;
        let interface = self
            .devices
            .first()?
            .model()
            .first_interface()
            .map(|iface| InterfaceSummary {
                class: iface.class,
                subclass: iface.subclass,
                protocol: iface.protocol,
            })
            .unwrap_or_default();
        Some(DeviceListReply::single(device, interface))
    }

    pub fn import_reply(&self) -> Option<ImportReply> {
        Some(ImportReply::new(self.exported_device()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::profiles::PortableSsd;

    fn storage_registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new(ExportSettings::default());
        registry.register(Box::new(PortableSsd::new().unwrap()));
        registry
    }

    #[test]
    fn empty_registry_has_no_replies() {
        let registry = DeviceRegistry::new(ExportSettings::default());
        assert!(registry.is_empty());
        assert!(registry.device_list_reply().is_none());
        assert!(registry.import_reply().is_none());
    }

    #[test]
    fn device_list_reflects_the_registered_model() {
        let registry = storage_registry();
        let reply = registry.device_list_reply().unwrap();
        assert_eq!(reply.exported_count, 1);
        assert_eq!(reply.device.id_vendor, 0x04e8);
        assert_eq!(reply.device.id_product, 0x61f6);
        assert_eq!(reply.device.bus_id, "1-1");
        assert_eq!(reply.device.num_interfaces, 1);
        assert_eq!(reply.interface.class, 0x08);
        assert_eq!(reply.interface.protocol, 0x50);
    }

    #[test]
    fn import_reply_shares_the_same_identity() {
        let registry = storage_registry();
        let devlist = registry.device_list_reply().unwrap();
        let import = registry.import_reply().unwrap();
        assert_eq!(import.device, devlist.device);
    }
}
