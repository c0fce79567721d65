//! USB/IP session engine
//!
//! Iterative blocking server: one connection is accepted and serviced to
//! completion before the next accept. Per connection the engine walks
//! `Unattached -> Attached -> Closed`: the handshake phase answers
//! device-list requests and promotes an import to the attached state, the
//! attached phase relays submit envelopes to the control dispatcher or
//! the device's data handler. A fresh [`Session`] is created per
//! connection; a disconnect is silent and the engine returns to accept.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::net::TcpListener;

use thiserror::Error;
use tracing::{debug, info, warn};

use protocol::{
    BUS_ID_LEN, CmdSubmit, Direction, OP_REQ_DEVLIST, OP_REQ_IMPORT, OpHeader, ProtocolError,
    RetSubmit, TransferRequest, USBIP_CMD_SUBMIT,
};

use crate::dispatch;
use crate::registry::DeviceRegistry;

/// Per-connection mutable state.
///
/// Owned exclusively by the engine's processing loop; created on accept
/// and dropped on disconnect. Device-side OUT accumulation lives in the
/// device profile itself, which is the single owner of that buffer.
#[derive(Debug, Default)]
pub struct Session {
    pub attached: bool,
    alt_settings: BTreeMap<u8, u8>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current alternate setting for an interface number; zero until
    /// SET_INTERFACE changes it.
    pub fn alternate_setting(&self, interface: u8) -> u8 {
        self.alt_settings.get(&interface).copied().unwrap_or(0)
    }

    pub fn set_alternate_setting(&mut self, interface: u8, alternate: u8) {
        self.alt_settings.insert(interface, alternate);
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Stream desynchronized; the connection cannot continue
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no device registered")]
    NoDevice,
}

/// The session state machine, serving the registry's exported device.
pub struct SessionEngine<'a> {
    registry: &'a mut DeviceRegistry,
}

impl<'a> SessionEngine<'a> {
    pub fn new(registry: &'a mut DeviceRegistry) -> Self {
        Self { registry }
    }

    /// Accept loop. Serves one connection at a time, forever. A failed
    /// session is logged and the engine resumes accepting; only listener
    /// failures or an empty registry end the loop.
    pub fn run(&mut self, listener: &TcpListener) -> Result<(), SessionError> {
        if self.registry.is_empty() {
            return Err(SessionError::NoDevice);
        }

        loop {
            let (stream, peer) = listener.accept()?;
            info!(%peer, "client connected");
            match self.serve_connection(stream) {
                Ok(()) => info!(%peer, "client disconnected"),
                Err(err) => warn!(%peer, error = %err, "session terminated"),
            }
        }
    }

    /// Serve one connection until the peer disconnects or the stream
    /// desynchronizes. Returns `Ok(())` for a clean disconnect.
    pub fn serve_connection<S: Read + Write>(
        &mut self,
        mut stream: S,
    ) -> Result<(), SessionError> {
        let mut session = Session::new();

        loop {
            if !session.attached {
                let Some(buf) = read_block(&mut stream, OpHeader::SIZE)? else {
                    return Ok(());
                };
                let header = OpHeader::decode(&buf)?;
                debug!("handshake command {:#06x}", header.command);

                match header.command {
                    OP_REQ_DEVLIST => {
                        let reply = self
                            .registry
                            .device_list_reply()
                            .ok_or(SessionError::NoDevice)?;
                        stream.write_all(&reply.encode()?)?;
                        debug!("device list sent");
                    }
                    OP_REQ_IMPORT => {
                        // fixed-size bus id follows the header; the engine
                        // exports a single device, so the value only gets
                        // logged
                        let Some(bus_id) = read_block(&mut stream, BUS_ID_LEN)? else {
                            return Ok(());
                        };
                        let requested = String::from_utf8_lossy(&bus_id)
                            .trim_end_matches('\0')
                            .to_string();
                        let reply = self.registry.import_reply().ok_or(SessionError::NoDevice)?;
                        stream.write_all(&reply.encode()?)?;
                        session.attached = true;
                        info!(bus_id = %requested, "device attached");
                    }
                    other => {
                        warn!("unrecognized handshake command {other:#06x}, closing");
                        return Ok(());
                    }
                }
            } else {
                let Some(buf) = read_block(&mut stream, CmdSubmit::SIZE)? else {
                    debug!("peer closed while attached");
                    return Ok(());
                };
                let cmd = CmdSubmit::decode(&buf)?;
                if cmd.command != USBIP_CMD_SUBMIT {
                    warn!(command = cmd.command, "unexpected submit-phase command, closing");
                    return Ok(());
                }

                let payload = if Direction::from_wire(cmd.direction) == Direction::Out
                    && cmd.transfer_buffer_length > 0
                {
                    let Some(payload) =
                        read_block(&mut stream, cmd.transfer_buffer_length as usize)?
                    else {
                        debug!("peer closed mid-payload");
                        return Ok(());
                    };
                    payload
                } else {
                    Vec::new()
                };

                let request = TransferRequest::from_submit(&cmd, payload);
                let device = self.registry.active_mut().ok_or(SessionError::NoDevice)?;

                let reply = if request.ep == 0 {
                    let outcome = dispatch::dispatch(&mut session, device, &request);
                    RetSubmit::new(request.seqnum, outcome.status, outcome.data)
                } else {
                    let data = device.handle_data(&request);
                    RetSubmit::new(request.seqnum, 0, data)
                };

                debug!(
                    seqnum = reply.seqnum,
                    status = reply.status,
                    actual_length = reply.actual_length,
                    "submit answered"
                );
                stream.write_all(&reply.encode()?)?;
            }
        }
    }
}

/// Read exactly `len` bytes. `None` means the peer disconnected before
/// the block completed, which callers treat as a clean close.
fn read_block<S: Read>(stream: &mut S, len: usize) -> io::Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Ok(None),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(Some(buf))
}
