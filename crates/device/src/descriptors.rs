//! USB descriptor entities and their wire schemas
//!
//! Every integer inside a USB descriptor is little-endian, so the schemas
//! here tag their multi-byte fields accordingly. The bLength and
//! bDescriptorType constants are schema defaults; entity structs only
//! carry the fields a device profile actually chooses.

use protocol::codec::{self, FieldSpec, Record, StructSchema};
use protocol::Result;

pub const DEVICE_DESCRIPTOR: StructSchema = StructSchema {
    name: "device_descriptor",
    fields: &[
        FieldSpec::u8("bLength").with_default(18),
        FieldSpec::u8("bDescriptorType").with_default(1),
        FieldSpec::u16("bcdUSB").le().with_default(0x0110),
        FieldSpec::u8("bDeviceClass"),
        FieldSpec::u8("bDeviceSubClass"),
        FieldSpec::u8("bDeviceProtocol"),
        FieldSpec::u8("bMaxPacketSize0"),
        FieldSpec::u16("idVendor").le(),
        FieldSpec::u16("idProduct").le(),
        FieldSpec::u16("bcdDevice").le(),
        FieldSpec::u8("iManufacturer"),
        FieldSpec::u8("iProduct"),
        FieldSpec::u8("iSerialNumber"),
        FieldSpec::u8("bNumConfigurations"),
    ],
};

pub const CONFIGURATION_DESCRIPTOR: StructSchema = StructSchema {
    name: "configuration_descriptor",
    fields: &[
        FieldSpec::u8("bLength").with_default(9),
        FieldSpec::u8("bDescriptorType").with_default(2),
        FieldSpec::u16("wTotalLength").le(),
        FieldSpec::u8("bNumInterfaces"),
        FieldSpec::u8("bConfigurationValue").with_default(1),
        FieldSpec::u8("iConfiguration"),
        FieldSpec::u8("bmAttributes").with_default(0x80),
        FieldSpec::u8("bMaxPower"),
    ],
};

pub const INTERFACE_DESCRIPTOR: StructSchema = StructSchema {
    name: "interface_descriptor",
    fields: &[
        FieldSpec::u8("bLength").with_default(9),
        FieldSpec::u8("bDescriptorType").with_default(4),
        FieldSpec::u8("bInterfaceNumber"),
        FieldSpec::u8("bAlternateSetting"),
        FieldSpec::u8("bNumEndpoints"),
        FieldSpec::u8("bInterfaceClass"),
        FieldSpec::u8("bInterfaceSubClass"),
        FieldSpec::u8("bInterfaceProtocol"),
        FieldSpec::u8("iInterface"),
    ],
};

pub const ENDPOINT_DESCRIPTOR: StructSchema = StructSchema {
    name: "endpoint_descriptor",
    fields: &[
        FieldSpec::u8("bLength").with_default(7),
        FieldSpec::u8("bDescriptorType").with_default(5),
        FieldSpec::u8("bEndpointAddress"),
        FieldSpec::u8("bmAttributes"),
        FieldSpec::u16("wMaxPacketSize").le(),
        FieldSpec::u8("bInterval"),
    ],
};

pub const DEVICE_QUALIFIER_DESCRIPTOR: StructSchema = StructSchema {
    name: "device_qualifier_descriptor",
    fields: &[
        FieldSpec::u8("bLength").with_default(10),
        FieldSpec::u8("bDescriptorType").with_default(6),
        FieldSpec::u16("bcdUSB").le().with_default(0x0200),
        FieldSpec::u8("bDeviceClass"),
        FieldSpec::u8("bDeviceSubClass"),
        FieldSpec::u8("bDeviceProtocol"),
        FieldSpec::u8("bMaxPacketSize0"),
        FieldSpec::u8("bNumConfigurations"),
        FieldSpec::u8("bReserved"),
    ],
};

pub const BOS_DESCRIPTOR: StructSchema = StructSchema {
    name: "bos_descriptor",
    fields: &[
        FieldSpec::u8("bLength").with_default(5),
        FieldSpec::u8("bDescriptorType").with_default(0x0F),
        FieldSpec::u16("wTotalLength").le(),
        FieldSpec::u8("bNumDeviceCaps"),
    ],
};

/// Device-level descriptor fields chosen by a profile.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub bcd_usb: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub max_packet_size0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    /// String descriptor indices; zero means "no string".
    pub manufacturer_str: u8,
    pub product_str: u8,
    pub serial_str: u8,
    pub num_configurations: u8,
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self {
            bcd_usb: 0x0110,
            device_class: 0,
            device_subclass: 0,
            device_protocol: 0,
            max_packet_size0: 64,
            vendor_id: 0,
            product_id: 0,
            bcd_device: 0,
            manufacturer_str: 0,
            product_str: 0,
            serial_str: 0,
            num_configurations: 1,
        }
    }
}

impl DeviceDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("bcdUSB", u64::from(self.bcd_usb))
            .with_uint("bDeviceClass", u64::from(self.device_class))
            .with_uint("bDeviceSubClass", u64::from(self.device_subclass))
            .with_uint("bDeviceProtocol", u64::from(self.device_protocol))
            .with_uint("bMaxPacketSize0", u64::from(self.max_packet_size0))
            .with_uint("idVendor", u64::from(self.vendor_id))
            .with_uint("idProduct", u64::from(self.product_id))
            .with_uint("bcdDevice", u64::from(self.bcd_device))
            .with_uint("iManufacturer", u64::from(self.manufacturer_str))
            .with_uint("iProduct", u64::from(self.product_str))
            .with_uint("iSerialNumber", u64::from(self.serial_str))
            .with_uint("bNumConfigurations", u64::from(self.num_configurations));
        codec::encode(&DEVICE_DESCRIPTOR, &record)
    }
}

/// One endpoint of an interface alternate setting.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Endpoint address including the direction bit (e.g. 0x81 = EP1 IN).
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
    /// Class-specific descriptor bytes appended right after this endpoint
    /// in the configuration blob.
    pub class_descriptor: Option<Vec<u8>>,
}

impl Endpoint {
    pub fn bulk(address: u8, max_packet_size: u16) -> Self {
        Self {
            address,
            attributes: 0x02,
            max_packet_size,
            interval: 0,
            class_descriptor: None,
        }
    }

    pub fn with_class_descriptor(mut self, bytes: Vec<u8>) -> Self {
        self.class_descriptor = Some(bytes);
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("bEndpointAddress", u64::from(self.address))
            .with_uint("bmAttributes", u64::from(self.attributes))
            .with_uint("wMaxPacketSize", u64::from(self.max_packet_size))
            .with_uint("bInterval", u64::from(self.interval));
        codec::encode(&ENDPOINT_DESCRIPTOR, &record)
    }
}

/// One alternate setting of an interface number.
#[derive(Debug, Clone)]
pub struct Interface {
    pub number: u8,
    pub alternate_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub string_index: u8,
    /// Class-specific descriptor bytes appended right after the interface
    /// descriptor in the configuration blob.
    pub class_descriptor: Option<Vec<u8>>,
    pub endpoints: Vec<Endpoint>,
}

impl Interface {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("bInterfaceNumber", u64::from(self.number))
            .with_uint("bAlternateSetting", u64::from(self.alternate_setting))
            .with_uint("bNumEndpoints", self.endpoints.len() as u64)
            .with_uint("bInterfaceClass", u64::from(self.class))
            .with_uint("bInterfaceSubClass", u64::from(self.subclass))
            .with_uint("bInterfaceProtocol", u64::from(self.protocol))
            .with_uint("iInterface", u64::from(self.string_index));
        codec::encode(&INTERFACE_DESCRIPTOR, &record)
    }
}

/// One configuration and its interfaces, covering every alternate setting
/// in declared order.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub value: u8,
    pub string_index: u8,
    pub attributes: u8,
    pub max_power: u8,
    pub interfaces: Vec<Interface>,
}

impl Configuration {
    /// Encode the 9-byte configuration descriptor head. The totals are
    /// computed by the model when it flattens the blob.
    pub(crate) fn encode_head(&self, total_length: u16, num_interfaces: u8) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("wTotalLength", u64::from(total_length))
            .with_uint("bNumInterfaces", u64::from(num_interfaces))
            .with_uint("bConfigurationValue", u64::from(self.value))
            .with_uint("iConfiguration", u64::from(self.string_index))
            .with_uint("bmAttributes", u64::from(self.attributes))
            .with_uint("bMaxPower", u64::from(self.max_power));
        codec::encode(&CONFIGURATION_DESCRIPTOR, &record)
    }
}

/// High-speed/full-speed dual operation descriptor.
#[derive(Debug, Clone)]
pub struct DeviceQualifier {
    pub bcd_usb: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub max_packet_size0: u8,
    pub num_configurations: u8,
}

impl DeviceQualifier {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("bcdUSB", u64::from(self.bcd_usb))
            .with_uint("bDeviceClass", u64::from(self.device_class))
            .with_uint("bDeviceSubClass", u64::from(self.device_subclass))
            .with_uint("bDeviceProtocol", u64::from(self.device_protocol))
            .with_uint("bMaxPacketSize0", u64::from(self.max_packet_size0))
            .with_uint("bNumConfigurations", u64::from(self.num_configurations));
        codec::encode(&DEVICE_QUALIFIER_DESCRIPTOR, &record)
    }
}

/// Binary device object store: a 5-byte head followed by raw capability
/// descriptor blocks.
#[derive(Debug, Clone, Default)]
pub struct Bos {
    pub capabilities: Vec<Vec<u8>>,
}

impl Bos {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let caps_len: usize = self.capabilities.iter().map(Vec::len).sum();
        let record = Record::new()
            .with_uint(
                "wTotalLength",
                (BOS_DESCRIPTOR.size() + caps_len) as u64,
            )
            .with_uint("bNumDeviceCaps", self.capabilities.len() as u64);
        let mut out = codec::encode(&BOS_DESCRIPTOR, &record)?;
        for cap in &self.capabilities {
            out.extend_from_slice(cap);
        }
        Ok(out)
    }
}
