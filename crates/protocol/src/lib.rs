//! USB/IP wire protocol for the device emulator
//!
//! This crate defines the binary protocol spoken with an importing
//! USB/IP host: a schema-driven codec for fixed-layout structures with
//! per-field endianness, the concrete message schemas and command codes,
//! the embedded control setup packet, and the transfer request type
//! handed to device implementations.
//!
//! # Example
//!
//! ```
//! use protocol::{OpHeader, OP_REQ_DEVLIST};
//!
//! let header = OpHeader::request(OP_REQ_DEVLIST);
//! let bytes = header.encode().unwrap();
//! assert_eq!(bytes.len(), OpHeader::SIZE);
//!
//! let decoded = OpHeader::decode(&bytes).unwrap();
//! assert_eq!(decoded.command, OP_REQ_DEVLIST);
//! ```

pub mod codec;
pub mod error;
pub mod messages;
pub mod setup;
pub mod types;

pub use codec::{FieldKind, FieldSpec, FieldValue, Order, Record, StructSchema};
pub use error::{ProtocolError, Result};
pub use messages::{
    BUS_ID_LEN, CmdSubmit, DeviceListReply, ExportedDevice, ImportReply, InterfaceSummary,
    OP_REP_DEVLIST, OP_REP_IMPORT, OP_REQ_DEVLIST, OP_REQ_IMPORT, OpHeader, RetSubmit,
    SYSFS_PATH_LEN, USBIP_CMD_SUBMIT, USBIP_RET_SUBMIT, USBIP_VERSION,
};
pub use setup::{Recipient, RequestKind, SetupPacket};
pub use types::{Direction, TransferRequest};
