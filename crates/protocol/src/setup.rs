//! USB control setup packet
//!
//! The 8-byte header embedded in `USBIP_CMD_SUBMIT.setup` for endpoint-0
//! transfers. Unlike the big-endian USB/IP framing around it, the three
//! u16 parameters are little-endian per USB convention, so the schema
//! tags them per field.

use crate::codec::{self, FieldSpec, Record, StructSchema};
use crate::error::{ProtocolError, Result};

pub const SETUP_PACKET: StructSchema = StructSchema {
    name: "setup_packet",
    fields: &[
        FieldSpec::u8("bmRequestType"),
        FieldSpec::u8("bRequest"),
        FieldSpec::u16("wValue").le(),
        FieldSpec::u16("wIndex").le(),
        FieldSpec::u16("wLength").le(),
    ],
};

/// Standard request codes (USB 2.0 table 9-4)
pub const GET_STATUS: u8 = 0x00;
pub const GET_DESCRIPTOR: u8 = 0x06;
pub const SET_CONFIGURATION: u8 = 0x09;
pub const SET_INTERFACE: u8 = 0x0B;

/// Descriptor type codes carried in the high byte of wValue
pub const DT_DEVICE: u8 = 0x01;
pub const DT_CONFIGURATION: u8 = 0x02;
pub const DT_STRING: u8 = 0x03;
pub const DT_DEVICE_QUALIFIER: u8 = 0x06;
pub const DT_DEBUG: u8 = 0x0A;
pub const DT_BOS: u8 = 0x0F;

const DIRECTION_IN: u8 = 0x80;
const KIND_MASK: u8 = 0x60;
const RECIPIENT_MASK: u8 = 0x1F;

/// Request category from bits 5..6 of bmRequestType.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// Request target from bits 0..4 of bmRequestType.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other(u8),
}

/// Decoded control setup packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub const SIZE: usize = SETUP_PACKET.size();

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let record = codec::decode(&SETUP_PACKET, buf)?;
        let field = |name: &'static str| -> Result<u64> {
            record.uint(name).ok_or(ProtocolError::MissingField {
                schema: SETUP_PACKET.name,
                field: name,
            })
        };
        Ok(Self {
            request_type: field("bmRequestType")? as u8,
            request: field("bRequest")? as u8,
            value: field("wValue")? as u16,
            index: field("wIndex")? as u16,
            length: field("wLength")? as u16,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let record = Record::new()
            .with_uint("bmRequestType", u64::from(self.request_type))
            .with_uint("bRequest", u64::from(self.request))
            .with_uint("wValue", u64::from(self.value))
            .with_uint("wIndex", u64::from(self.index))
            .with_uint("wLength", u64::from(self.length));
        codec::encode(&SETUP_PACKET, &record)
    }

    /// Device-to-host transfer?
    pub fn is_in(&self) -> bool {
        self.request_type & DIRECTION_IN != 0
    }

    pub fn kind(&self) -> RequestKind {
        match (self.request_type & KIND_MASK) >> 5 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.request_type & RECIPIENT_MASK {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            other => Recipient::Other(other),
        }
    }

    /// Descriptor type requested by GET_DESCRIPTOR (high byte of wValue).
    pub fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Descriptor index requested by GET_DESCRIPTOR (low byte of wValue).
    pub fn descriptor_index(&self) -> u8 {
        self.value as u8
    }
}
