//! Transfer request types handed to device implementations

use crate::messages::CmdSubmit;

/// Transfer direction as seen from the importing host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device; the CmdSubmit envelope is followed by
    /// `transfer_buffer_length` payload bytes.
    Out,
    /// Device to host; `transfer_buffer_length` is the requested read size.
    In,
}

impl Direction {
    pub fn from_wire(raw: u32) -> Self {
        if raw == 1 { Self::In } else { Self::Out }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            Self::Out => 0,
            Self::In => 1,
        }
    }
}

/// One USB transfer taken from a `USBIP_CMD_SUBMIT`, dispatched to the
/// control dispatcher (endpoint 0) or the device's data handler, and
/// discarded once the matching `RET_SUBMIT` is written.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub seqnum: u32,
    pub devid: u32,
    pub direction: Direction,
    pub ep: u32,
    pub transfer_flags: u32,
    pub transfer_buffer_length: u32,
    pub number_of_packets: u32,
    pub interval: u32,
    /// Raw 8-byte setup packet; meaningful only for endpoint 0.
    pub setup: [u8; 8],
    /// OUT payload; empty for IN transfers.
    pub payload: Vec<u8>,
}

impl TransferRequest {
    pub fn from_submit(cmd: &CmdSubmit, payload: Vec<u8>) -> Self {
        Self {
            seqnum: cmd.seqnum,
            devid: cmd.devid,
            direction: Direction::from_wire(cmd.direction),
            ep: cmd.ep,
            transfer_flags: cmd.transfer_flags,
            transfer_buffer_length: cmd.transfer_buffer_length,
            number_of_packets: cmd.number_of_packets,
            interval: cmd.interval,
            setup: cmd.setup,
            payload,
        }
    }
}
