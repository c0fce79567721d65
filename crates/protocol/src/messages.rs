//! USB/IP wire message definitions
//!
//! Command constants, field schemas, and typed structs for every message
//! the session state machine exchanges: the handshake-phase `OP_*`
//! messages and the submit-phase `USBIP_CMD_SUBMIT` / `USBIP_RET_SUBMIT`
//! envelopes. The schemas here are the canonical source of truth for the
//! byte layout; the typed structs front them so callers never touch raw
//! records.
//!
//! All framing integers are network order. The submit envelopes are
//! followed on the wire by a variable-length payload that is not part of
//! the fixed schema: `transfer_buffer_length` bytes after an OUT
//! `CMD_SUBMIT`, `actual_length` bytes after a `RET_SUBMIT`.

use crate::codec::{self, FieldSpec, Record, StructSchema};
use crate::error::{ProtocolError, Result};

/// USB/IP protocol version 1.1.1
pub const USBIP_VERSION: u16 = 0x0111;

/// Handshake: request the exported device list
pub const OP_REQ_DEVLIST: u16 = 0x8005;
/// Handshake: device list reply
pub const OP_REP_DEVLIST: u16 = 0x0005;
/// Handshake: import (attach) a device, followed by a 32-byte bus id
pub const OP_REQ_IMPORT: u16 = 0x8003;
/// Handshake: import reply
pub const OP_REP_IMPORT: u16 = 0x0003;

/// Submit phase: URB submission from the importing host
pub const USBIP_CMD_SUBMIT: u32 = 0x0000_0001;
/// Submit phase: URB completion back to the importing host
pub const USBIP_RET_SUBMIT: u32 = 0x0000_0003;

/// Width of the fixed bus-id field following `OP_REQ_IMPORT`
pub const BUS_ID_LEN: usize = 32;
/// Width of the sysfs path field in the handshake replies
pub const SYSFS_PATH_LEN: usize = 256;

pub const OP_HEADER: StructSchema = StructSchema {
    name: "op_header",
    fields: &[
        FieldSpec::u16("version").with_default(USBIP_VERSION as u64),
        FieldSpec::u16("command"),
        FieldSpec::u32("status"),
    ],
};

pub const INTERFACE_SUMMARY: StructSchema = StructSchema {
    name: "interface_summary",
    fields: &[
        FieldSpec::u8("bInterfaceClass"),
        FieldSpec::u8("bInterfaceSubClass"),
        FieldSpec::u8("bInterfaceProtocol"),
        FieldSpec::u8("align"),
    ],
};

pub const DEV_LIST_REPLY: StructSchema = StructSchema {
    name: "op_rep_devlist",
    fields: &[
        FieldSpec::nested("base", &OP_HEADER),
        FieldSpec::u32("nExportedDevice"),
        FieldSpec::bytes("usbPath", SYSFS_PATH_LEN),
        FieldSpec::bytes("busID", BUS_ID_LEN),
        FieldSpec::u32("busnum"),
        FieldSpec::u32("devnum"),
        FieldSpec::u32("speed"),
        FieldSpec::u16("idVendor"),
        FieldSpec::u16("idProduct"),
        FieldSpec::u16("bcdDevice"),
        FieldSpec::u8("bDeviceClass"),
        FieldSpec::u8("bDeviceSubClass"),
        FieldSpec::u8("bDeviceProtocol"),
        FieldSpec::u8("bConfigurationValue"),
        FieldSpec::u8("bNumConfigurations"),
        FieldSpec::u8("bNumInterfaces"),
        FieldSpec::nested("interface", &INTERFACE_SUMMARY),
    ],
};

pub const IMPORT_REPLY: StructSchema = StructSchema {
    name: "op_rep_import",
    fields: &[
        FieldSpec::nested("base", &OP_HEADER),
        FieldSpec::bytes("usbPath", SYSFS_PATH_LEN),
        FieldSpec::bytes("busID", BUS_ID_LEN),
        FieldSpec::u32("busnum"),
        FieldSpec::u32("devnum"),
        FieldSpec::u32("speed"),
        FieldSpec::u16("idVendor"),
        FieldSpec::u16("idProduct"),
        FieldSpec::u16("bcdDevice"),
        FieldSpec::u8("bDeviceClass"),
        FieldSpec::u8("bDeviceSubClass"),
        FieldSpec::u8("bDeviceProtocol"),
        FieldSpec::u8("bConfigurationValue"),
        FieldSpec::u8("bNumConfigurations"),
        FieldSpec::u8("bNumInterfaces"),
    ],
};

pub const CMD_SUBMIT: StructSchema = StructSchema {
    name: "usbip_cmd_submit",
    fields: &[
        FieldSpec::u32("command"),
        FieldSpec::u32("seqnum"),
        FieldSpec::u32("devid"),
        FieldSpec::u32("direction"),
        FieldSpec::u32("ep"),
        FieldSpec::u32("transfer_flags"),
        FieldSpec::u32("transfer_buffer_length"),
        FieldSpec::u32("start_frame"),
        FieldSpec::u32("number_of_packets"),
        FieldSpec::u32("interval"),
        FieldSpec::bytes("setup", 8),
    ],
};

pub const RET_SUBMIT: StructSchema = StructSchema {
    name: "usbip_ret_submit",
    fields: &[
        FieldSpec::u32("command").with_default(USBIP_RET_SUBMIT as u64),
        FieldSpec::u32("seqnum"),
        FieldSpec::u32("devid"),
        FieldSpec::u32("direction"),
        FieldSpec::u32("ep"),
        FieldSpec::u32("status"),
        FieldSpec::u32("actual_length"),
        FieldSpec::u32("start_frame"),
        FieldSpec::u32("number_of_packets"),
        FieldSpec::u32("error_count"),
        FieldSpec::u64("setup"),
    ],
};

fn uint_field(record: &Record, schema: &StructSchema, name: &'static str) -> Result<u64> {
    record.uint(name).ok_or(ProtocolError::MissingField {
        schema: schema.name,
        field: name,
    })
}

fn bytes_field<'a>(
    record: &'a Record,
    schema: &StructSchema,
    name: &'static str,
) -> Result<&'a [u8]> {
    record.bytes(name).ok_or(ProtocolError::MissingField {
        schema: schema.name,
        field: name,
    })
}

fn text_field(record: &Record, schema: &StructSchema, name: &'static str) -> Result<String> {
    let raw = bytes_field(record, schema, name)?;
    Ok(String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_string())
}

/// Handshake-phase message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpHeader {
    pub version: u16,
    pub command: u16,
    pub status: u32,
}

impl OpHeader {
    pub const SIZE: usize = OP_HEADER.size();

    /// Header for a request with the given command code.
    pub fn request(command: u16) -> Self {
        Self {
            version: USBIP_VERSION,
            command,
            status: 0,
        }
    }

    /// Header for a success reply with the given command code.
    pub fn reply(command: u16) -> Self {
        Self::request(command)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("version", u64::from(self.version))
            .with_uint("command", u64::from(self.command))
            .with_uint("status", u64::from(self.status));
        codec::encode(&OP_HEADER, &record)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let record = codec::decode(&OP_HEADER, buf)?;
        Ok(Self {
            version: uint_field(&record, &OP_HEADER, "version")? as u16,
            command: uint_field(&record, &OP_HEADER, "command")? as u16,
            status: uint_field(&record, &OP_HEADER, "status")? as u32,
        })
    }
}

/// Class/subclass/protocol triple reported for the exported device's
/// first interface in the device-list reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceSummary {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
}

impl InterfaceSummary {
    fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("bInterfaceClass", u64::from(self.class))
            .with_uint("bInterfaceSubClass", u64::from(self.subclass))
            .with_uint("bInterfaceProtocol", u64::from(self.protocol));
        codec::encode(&INTERFACE_SUMMARY, &record)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let record = codec::decode(&INTERFACE_SUMMARY, buf)?;
        Ok(Self {
            class: uint_field(&record, &INTERFACE_SUMMARY, "bInterfaceClass")? as u8,
            subclass: uint_field(&record, &INTERFACE_SUMMARY, "bInterfaceSubClass")? as u8,
            protocol: uint_field(&record, &INTERFACE_SUMMARY, "bInterfaceProtocol")? as u8,
        })
    }
}

/// Bus identity and descriptor summary of the exported device, shared by
/// the device-list and import replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDevice {
    pub usb_path: String,
    pub bus_id: String,
    pub busnum: u32,
    pub devnum: u32,
    pub speed: u32,
    pub id_vendor: u16,
    pub id_product: u16,
    pub bcd_device: u16,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub configuration_value: u8,
    pub num_configurations: u8,
    pub num_interfaces: u8,
}

impl ExportedDevice {
    fn fill(&self, record: Record) -> Record {
        record
            .with_bytes("usbPath", self.usb_path.as_bytes())
            .with_bytes("busID", self.bus_id.as_bytes())
            .with_uint("busnum", u64::from(self.busnum))
            .with_uint("devnum", u64::from(self.devnum))
            .with_uint("speed", u64::from(self.speed))
            .with_uint("idVendor", u64::from(self.id_vendor))
            .with_uint("idProduct", u64::from(self.id_product))
            .with_uint("bcdDevice", u64::from(self.bcd_device))
            .with_uint("bDeviceClass", u64::from(self.device_class))
            .with_uint("bDeviceSubClass", u64::from(self.device_subclass))
            .with_uint("bDeviceProtocol", u64::from(self.device_protocol))
            .with_uint("bConfigurationValue", u64::from(self.configuration_value))
            .with_uint("bNumConfigurations", u64::from(self.num_configurations))
            .with_uint("bNumInterfaces", u64::from(self.num_interfaces))
    }

    fn extract(record: &Record, schema: &StructSchema) -> Result<Self> {
        Ok(Self {
            usb_path: text_field(record, schema, "usbPath")?,
            bus_id: text_field(record, schema, "busID")?,
            busnum: uint_field(record, schema, "busnum")? as u32,
            devnum: uint_field(record, schema, "devnum")? as u32,
            speed: uint_field(record, schema, "speed")? as u32,
            id_vendor: uint_field(record, schema, "idVendor")? as u16,
            id_product: uint_field(record, schema, "idProduct")? as u16,
            bcd_device: uint_field(record, schema, "bcdDevice")? as u16,
            device_class: uint_field(record, schema, "bDeviceClass")? as u8,
            device_subclass: uint_field(record, schema, "bDeviceSubClass")? as u8,
            device_protocol: uint_field(record, schema, "bDeviceProtocol")? as u8,
            configuration_value: uint_field(record, schema, "bConfigurationValue")? as u8,
            num_configurations: uint_field(record, schema, "bNumConfigurations")? as u8,
            num_interfaces: uint_field(record, schema, "bNumInterfaces")? as u8,
        })
    }
}

/// `OP_REP_DEVLIST` reporting the exported device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceListReply {
    pub exported_count: u32,
    pub device: ExportedDevice,
    pub interface: InterfaceSummary,
}

impl DeviceListReply {
    pub const SIZE: usize = DEV_LIST_REPLY.size();

    /// Reply for an engine exporting exactly one device.
    pub fn single(device: ExportedDevice, interface: InterfaceSummary) -> Self {
        Self {
            exported_count: 1,
            device,
            interface,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let base = OpHeader::reply(OP_REP_DEVLIST).encode()?;
        let interface = self.interface.encode()?;
        let record = self
            .device
            .fill(Record::new())
            .with_bytes("base", base)
            .with_uint("nExportedDevice", u64::from(self.exported_count))
            .with_bytes("interface", interface);
        codec::encode(&DEV_LIST_REPLY, &record)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let record = codec::decode(&DEV_LIST_REPLY, buf)?;
        Ok(Self {
            exported_count: uint_field(&record, &DEV_LIST_REPLY, "nExportedDevice")? as u32,
            device: ExportedDevice::extract(&record, &DEV_LIST_REPLY)?,
            interface: InterfaceSummary::decode(bytes_field(
                &record,
                &DEV_LIST_REPLY,
                "interface",
            )?)?,
        })
    }

    pub fn header(buf: &[u8]) -> Result<OpHeader> {
        let record = codec::decode(&DEV_LIST_REPLY, buf)?;
        OpHeader::decode(bytes_field(&record, &DEV_LIST_REPLY, "base")?)
    }
}

/// `OP_REP_IMPORT` acknowledging an attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReply {
    pub device: ExportedDevice,
}

impl ImportReply {
    pub const SIZE: usize = IMPORT_REPLY.size();

    pub fn new(device: ExportedDevice) -> Self {
        Self { device }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let base = OpHeader::reply(OP_REP_IMPORT).encode()?;
        let record = self.device.fill(Record::new()).with_bytes("base", base);
        codec::encode(&IMPORT_REPLY, &record)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let record = codec::decode(&IMPORT_REPLY, buf)?;
        Ok(Self {
            device: ExportedDevice::extract(&record, &IMPORT_REPLY)?,
        })
    }

    pub fn header(buf: &[u8]) -> Result<OpHeader> {
        let record = codec::decode(&IMPORT_REPLY, buf)?;
        OpHeader::decode(bytes_field(&record, &IMPORT_REPLY, "base")?)
    }
}

/// `USBIP_CMD_SUBMIT` envelope.
///
/// The transfer payload that may follow on the wire is read separately by
/// the session engine; it is not part of this fixed-size structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdSubmit {
    pub command: u32,
    pub seqnum: u32,
    pub devid: u32,
    pub direction: u32,
    pub ep: u32,
    pub transfer_flags: u32,
    pub transfer_buffer_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub interval: u32,
    pub setup: [u8; 8],
}

impl CmdSubmit {
    pub const SIZE: usize = CMD_SUBMIT.size();

    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("command", u64::from(self.command))
            .with_uint("seqnum", u64::from(self.seqnum))
            .with_uint("devid", u64::from(self.devid))
            .with_uint("direction", u64::from(self.direction))
            .with_uint("ep", u64::from(self.ep))
            .with_uint("transfer_flags", u64::from(self.transfer_flags))
            .with_uint(
                "transfer_buffer_length",
                u64::from(self.transfer_buffer_length),
            )
            .with_uint("start_frame", u64::from(self.start_frame))
            .with_uint("number_of_packets", u64::from(self.number_of_packets))
            .with_uint("interval", u64::from(self.interval))
            .with_bytes("setup", self.setup.as_slice());
        codec::encode(&CMD_SUBMIT, &record)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let record = codec::decode(&CMD_SUBMIT, buf)?;
        let raw_setup = bytes_field(&record, &CMD_SUBMIT, "setup")?;
        let mut setup = [0u8; 8];
        if raw_setup.len() != setup.len() {
            return Err(ProtocolError::LengthMismatch {
                schema: CMD_SUBMIT.name,
                expected: setup.len(),
                actual: raw_setup.len(),
            });
        }
        setup.copy_from_slice(raw_setup);
        Ok(Self {
            command: uint_field(&record, &CMD_SUBMIT, "command")? as u32,
            seqnum: uint_field(&record, &CMD_SUBMIT, "seqnum")? as u32,
            devid: uint_field(&record, &CMD_SUBMIT, "devid")? as u32,
            direction: uint_field(&record, &CMD_SUBMIT, "direction")? as u32,
            ep: uint_field(&record, &CMD_SUBMIT, "ep")? as u32,
            transfer_flags: uint_field(&record, &CMD_SUBMIT, "transfer_flags")? as u32,
            transfer_buffer_length: uint_field(&record, &CMD_SUBMIT, "transfer_buffer_length")?
                as u32,
            start_frame: uint_field(&record, &CMD_SUBMIT, "start_frame")? as u32,
            number_of_packets: uint_field(&record, &CMD_SUBMIT, "number_of_packets")? as u32,
            interval: uint_field(&record, &CMD_SUBMIT, "interval")? as u32,
            setup,
        })
    }
}

/// `USBIP_RET_SUBMIT` envelope plus its trailing payload.
///
/// `actual_length` always reflects `data.len()` for replies built through
/// [`RetSubmit::new`]; encoding appends the payload after the 48-byte
/// envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetSubmit {
    pub seqnum: u32,
    pub devid: u32,
    pub direction: u32,
    pub ep: u32,
    pub status: i32,
    pub actual_length: u32,
    pub start_frame: u32,
    pub number_of_packets: u32,
    pub error_count: u32,
    pub setup: u64,
    pub data: Vec<u8>,
}

impl RetSubmit {
    pub const SIZE: usize = RET_SUBMIT.size();

    pub fn new(seqnum: u32, status: i32, data: Vec<u8>) -> Self {
        Self {
            seqnum,
            devid: 0,
            direction: 0,
            ep: 0,
            status,
            actual_length: data.len() as u32,
            start_frame: 0,
            number_of_packets: 0,
            error_count: 0,
            setup: 0,
            data,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("seqnum", u64::from(self.seqnum))
            .with_uint("devid", u64::from(self.devid))
            .with_uint("direction", u64::from(self.direction))
            .with_uint("ep", u64::from(self.ep))
            .with_uint("status", u64::from(self.status as u32))
            .with_uint("actual_length", u64::from(self.actual_length))
            .with_uint("start_frame", u64::from(self.start_frame))
            .with_uint("number_of_packets", u64::from(self.number_of_packets))
            .with_uint("error_count", u64::from(self.error_count))
            .with_uint("setup", self.setup);
        let mut out = codec::encode(&RET_SUBMIT, &record)?;
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    /// Decode an envelope and its trailing payload. The payload length
    /// must match `actual_length` exactly.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(ProtocolError::LengthMismatch {
                schema: RET_SUBMIT.name,
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        let record = codec::decode(&RET_SUBMIT, &buf[..Self::SIZE])?;
        let actual_length = uint_field(&record, &RET_SUBMIT, "actual_length")? as u32;
        let data = buf[Self::SIZE..].to_vec();
        if data.len() != actual_length as usize {
            return Err(ProtocolError::LengthMismatch {
                schema: RET_SUBMIT.name,
                expected: Self::SIZE + actual_length as usize,
                actual: buf.len(),
            });
        }
        Ok(Self {
            seqnum: uint_field(&record, &RET_SUBMIT, "seqnum")? as u32,
            devid: uint_field(&record, &RET_SUBMIT, "devid")? as u32,
            direction: uint_field(&record, &RET_SUBMIT, "direction")? as u32,
            ep: uint_field(&record, &RET_SUBMIT, "ep")? as u32,
            status: uint_field(&record, &RET_SUBMIT, "status")? as u32 as i32,
            actual_length,
            start_frame: uint_field(&record, &RET_SUBMIT, "start_frame")? as u32,
            number_of_packets: uint_field(&record, &RET_SUBMIT, "number_of_packets")? as u32,
            error_count: uint_field(&record, &RET_SUBMIT, "error_count")? as u32,
            setup: uint_field(&record, &RET_SUBMIT, "setup")?,
            data,
        })
    }
}
