//! Control transfer dispatcher
//!
//! Resolves one endpoint-0 setup packet against the device model and the
//! session state. Standard device/interface requests are answered here;
//! anything else is handed to the device exactly once, and requests
//! nobody recognizes become a stall-status reply rather than an abort.

use device::{ControlOutcome, UsbDevice};
use protocol::setup::{
    self, DT_BOS, DT_CONFIGURATION, DT_DEBUG, DT_DEVICE, DT_DEVICE_QUALIFIER, DT_STRING,
    Recipient, RequestKind, SetupPacket,
};
use protocol::TransferRequest;
use tracing::{debug, trace, warn};

use crate::session::Session;

/// Linux EPIPE, the stall code the importing kernel expects.
pub const STALL_STATUS: i32 = -32;

/// Reply for one control transfer, before wLength clipping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    pub status: i32,
    pub data: Vec<u8>,
}

impl ControlReply {
    fn ok(data: Vec<u8>) -> Self {
        Self { status: 0, data }
    }

    fn stall() -> Self {
        Self {
            status: STALL_STATUS,
            data: Vec::new(),
        }
    }

    fn status_only(status: i32) -> Self {
        Self {
            status,
            data: Vec::new(),
        }
    }
}

/// Dispatch one control transfer.
///
/// Every reply is clipped to the setup packet's wLength on the way out;
/// the host never receives more bytes than it asked for.
pub fn dispatch(
    session: &mut Session,
    device: &mut dyn UsbDevice,
    request: &TransferRequest,
) -> ControlReply {
    let packet = match SetupPacket::decode(&request.setup) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(error = %err, "undecodable setup packet");
            return ControlReply::stall();
        }
    };

    trace!(
        request_type = packet.request_type,
        request = packet.request,
        value = packet.value,
        index = packet.index,
        length = packet.length,
        "control transfer"
    );

    let standard = resolve_standard(session, device, &packet);
    let mut reply = match standard {
        Some(reply) => reply,
        None => match device.handle_device_specific_control(&packet, request) {
            ControlOutcome::Handled(data) => ControlReply::ok(data),
            ControlOutcome::Unsupported => {
                warn!(
                    request_type = packet.request_type,
                    request = packet.request,
                    "control request unsupported, stalling"
                );
                ControlReply::stall()
            }
        },
    };

    reply.data.truncate(packet.length as usize);
    reply
}

/// Standard requests the dispatcher answers itself. `None` means the
/// request belongs to the device.
fn resolve_standard(
    session: &mut Session,
    device: &mut dyn UsbDevice,
    packet: &SetupPacket,
) -> Option<ControlReply> {
    if packet.kind() != RequestKind::Standard {
        return None;
    }

    match (packet.recipient(), packet.request, packet.is_in()) {
        (Recipient::Device, setup::GET_DESCRIPTOR, true) => get_descriptor(device, packet),
        (Recipient::Device, setup::GET_STATUS, true) => {
            // self-powered, no remote wakeup
            Some(ControlReply::ok(vec![0x01, 0x00]))
        }
        (Recipient::Device, setup::SET_CONFIGURATION, false) => {
            // single-configuration devices: accept and acknowledge
            debug!(configuration = packet.value, "set configuration");
            Some(ControlReply::ok(Vec::new()))
        }
        (Recipient::Interface, setup::SET_INTERFACE, false) => {
            Some(set_interface(session, device, packet))
        }
        _ => None,
    }
}

fn get_descriptor(device: &mut dyn UsbDevice, packet: &SetupPacket) -> Option<ControlReply> {
    let model = device.model();
    let result = match packet.descriptor_type() {
        DT_DEVICE => Ok(model.device_descriptor_bytes().to_vec()),
        DT_CONFIGURATION => model
            .raw_configuration(packet.descriptor_index())
            .map(<[u8]>::to_vec),
        DT_STRING => model.string_bytes(packet.descriptor_index(), packet.index),
        DT_DEVICE_QUALIFIER => model.device_qualifier_bytes(),
        DT_BOS => model.bos_bytes(),
        DT_DEBUG => {
            // not provided; answered with a positive status instead of a
            // stall so the host moves on immediately
            return Some(ControlReply::status_only(1));
        }
        other => {
            debug!(descriptor_type = other, "descriptor type not served here");
            return None;
        }
    };

    Some(match result {
        Ok(data) => ControlReply::ok(data),
        Err(err) => {
            warn!(error = %err, "descriptor unavailable");
            ControlReply::stall()
        }
    })
}

fn set_interface(
    session: &mut Session,
    device: &mut dyn UsbDevice,
    packet: &SetupPacket,
) -> ControlReply {
    let interface = packet.index as u8;
    if !device.model().has_interface(interface) {
        warn!(interface, "SET_INTERFACE for unknown interface");
        return ControlReply::stall();
    }
    let alternate = packet.value as u8;
    debug!(interface, alternate, "set interface");
    session.set_alternate_setting(interface, alternate);
    ControlReply::ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use device::profiles::{Loopback, PortableSsd};
    use device::{ControlOutcome, DeviceModel, UsbDevice};
    use protocol::{Direction, SetupPacket, TransferRequest};

    fn control_request(setup: SetupPacket) -> TransferRequest {
        TransferRequest {
            seqnum: 1,
            devid: 0,
            direction: if setup.is_in() {
                Direction::In
            } else {
                Direction::Out
            },
            ep: 0,
            transfer_flags: 0,
            transfer_buffer_length: setup.length as u32,
            number_of_packets: 0,
            interval: 0,
            setup: setup.encode().unwrap().try_into().unwrap(),
            payload: Vec::new(),
        }
    }

    fn get_descriptor_setup(descriptor_type: u8, index: u8, length: u16) -> SetupPacket {
        SetupPacket {
            request_type: 0x80,
            request: setup::GET_DESCRIPTOR,
            value: (u16::from(descriptor_type) << 8) | u16::from(index),
            index: 0,
            length,
        }
    }

    /// Counts delegations and returns a fixed outcome.
    struct Probe {
        model: DeviceModel,
        control_calls: usize,
        outcome: ControlOutcome,
    }

    impl Probe {
        fn new(outcome: ControlOutcome) -> Self {
            Self {
                model: Loopback::new().unwrap().model().clone(),
                control_calls: 0,
                outcome,
            }
        }
    }

    impl UsbDevice for Probe {
        fn model(&self) -> &DeviceModel {
            &self.model
        }

        fn handle_data(&mut self, _request: &TransferRequest) -> Vec<u8> {
            Vec::new()
        }

        fn handle_device_specific_control(
            &mut self,
            _setup: &SetupPacket,
            _request: &TransferRequest,
        ) -> ControlOutcome {
            self.control_calls += 1;
            self.outcome.clone()
        }
    }

    #[test]
    fn device_descriptor_is_clipped_to_wlength() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = get_descriptor_setup(setup::DT_DEVICE, 0, 8);
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, 0);
        assert_eq!(reply.data.len(), 8);
        assert_eq!(reply.data[0], 18);
        assert_eq!(reply.data[1], 1);
    }

    #[test]
    fn configuration_truncation_is_an_exact_prefix() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let full = device.model().raw_configuration(0).unwrap().to_vec();

        for length in [9u16, 32, full.len() as u16, 0xFFFF] {
            let setup = get_descriptor_setup(setup::DT_CONFIGURATION, 0, length);
            let reply = dispatch(&mut session, &mut device, &control_request(setup));
            assert_eq!(reply.status, 0);
            let expect = full.len().min(length as usize);
            assert_eq!(reply.data, &full[..expect]);
        }
    }

    #[test]
    fn string_descriptor_honors_index() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = get_descriptor_setup(setup::DT_STRING, 0, 255);
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, 0);
        assert_eq!(reply.data, vec![4, 3, 0x09, 0x04]);
    }

    #[test]
    fn missing_string_stalls() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = get_descriptor_setup(setup::DT_STRING, 9, 255);
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, STALL_STATUS);
        assert!(reply.data.is_empty());
    }

    #[test]
    fn absent_qualifier_stalls() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = get_descriptor_setup(setup::DT_DEVICE_QUALIFIER, 0, 10);
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, STALL_STATUS);
    }

    #[test]
    fn debug_descriptor_gets_positive_status() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = get_descriptor_setup(setup::DT_DEBUG, 0, 0);
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, 1);
        assert!(reply.data.is_empty());
    }

    #[test]
    fn get_status_reports_self_powered() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = SetupPacket {
            request_type: 0x80,
            request: setup::GET_STATUS,
            value: 0,
            index: 0,
            length: 2,
        };
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, 0);
        assert_eq!(reply.data, vec![0x01, 0x00]);
    }

    #[test]
    fn set_configuration_acknowledges_empty() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = SetupPacket {
            request_type: 0x00,
            request: setup::SET_CONFIGURATION,
            value: 1,
            index: 0,
            length: 0,
        };
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply, ControlReply::ok(Vec::new()));
    }

    #[test]
    fn set_interface_updates_session_and_is_idempotent() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = SetupPacket {
            request_type: 0x01,
            request: setup::SET_INTERFACE,
            value: 1,
            index: 0,
            length: 0,
        };

        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, 0);
        assert_eq!(session.alternate_setting(0), 1);

        let again = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(again.status, 0);
        assert_eq!(session.alternate_setting(0), 1);
    }

    #[test]
    fn set_interface_validates_the_interface_number() {
        let mut session = Session::new();
        let mut device = PortableSsd::new().unwrap();
        let setup = SetupPacket {
            request_type: 0x01,
            request: setup::SET_INTERFACE,
            value: 1,
            index: 5,
            length: 0,
        };
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, STALL_STATUS);
        assert_eq!(session.alternate_setting(5), 0);
    }

    #[test]
    fn unknown_requests_delegate_exactly_once() {
        let mut session = Session::new();
        let mut probe = Probe::new(ControlOutcome::Unsupported);
        let setup = SetupPacket {
            request_type: 0xC0,
            request: 0x42,
            value: 0,
            index: 0,
            length: 16,
        };
        let reply = dispatch(&mut session, &mut probe, &control_request(setup));
        assert_eq!(probe.control_calls, 1);
        assert_eq!(reply.status, STALL_STATUS);
    }

    #[test]
    fn handled_vendor_replies_are_clipped_to_wlength() {
        let mut session = Session::new();
        let mut probe = Probe::new(ControlOutcome::Handled(vec![1, 2, 3, 4, 5, 6]));
        let setup = SetupPacket {
            request_type: 0xC0,
            request: 0x42,
            value: 0,
            index: 0,
            length: 4,
        };
        let reply = dispatch(&mut session, &mut probe, &control_request(setup));
        assert_eq!(reply.status, 0);
        assert_eq!(reply.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn loopback_vendor_request_flows_through() {
        let mut session = Session::new();
        let mut device = Loopback::new().unwrap();
        let setup = SetupPacket {
            request_type: 0xC0,
            request: Loopback::REQ_PENDING,
            value: 0,
            index: 0,
            length: 4,
        };
        let reply = dispatch(&mut session, &mut device, &control_request(setup));
        assert_eq!(reply.status, 0);
        assert_eq!(reply.data, vec![0, 0, 0, 0]);
    }
}
