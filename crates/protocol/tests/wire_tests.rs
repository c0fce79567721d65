//! Integration tests for the USB/IP wire format
//!
//! Exercises the message schemas end to end: round-trips for every
//! message type, golden byte vectors captured from the kernel client's
//! wire traffic shape, and strict-length failure modes.

use protocol::{
    CmdSubmit, DeviceListReply, Direction, ExportedDevice, ImportReply, InterfaceSummary,
    OP_REP_DEVLIST, OP_REQ_DEVLIST, OP_REQ_IMPORT, OpHeader, ProtocolError, RetSubmit,
    SetupPacket, TransferRequest, USBIP_CMD_SUBMIT, USBIP_VERSION,
};

fn exported_device() -> ExportedDevice {
    ExportedDevice {
        usb_path: "/sys/devices/pci0000:00/0000:00:01.2/usb1/1-1".to_string(),
        bus_id: "1-1".to_string(),
        busnum: 1,
        devnum: 2,
        speed: 2,
        id_vendor: 0x04e8,
        id_product: 0x61f6,
        bcd_device: 0x0100,
        device_class: 0,
        device_subclass: 0,
        device_protocol: 0,
        configuration_value: 1,
        num_configurations: 1,
        num_interfaces: 1,
    }
}

mod handshake {
    use super::*;

    #[test]
    fn devlist_request_header() {
        let wire = OpHeader::request(OP_REQ_DEVLIST).encode().unwrap();
        assert_eq!(wire, [0x01, 0x11, 0x80, 0x05, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn import_request_header() {
        let wire = OpHeader::request(OP_REQ_IMPORT).encode().unwrap();
        assert_eq!(wire, [0x01, 0x11, 0x80, 0x03, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn header_rejects_short_buffer() {
        let err = OpHeader::decode(&[0x01, 0x11, 0x80]).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthMismatch { .. }));
    }

    #[test]
    fn devlist_reply_reports_registered_device() {
        let reply = DeviceListReply::single(
            exported_device(),
            InterfaceSummary {
                class: 0x08,
                subclass: 0x06,
                protocol: 0x50,
            },
        );
        let wire = reply.encode().unwrap();
        assert_eq!(wire.len(), DeviceListReply::SIZE);

        let decoded = DeviceListReply::decode(&wire).unwrap();
        assert_eq!(decoded.exported_count, 1);
        assert_eq!(decoded.device.id_vendor, 0x04e8);
        assert_eq!(decoded.device.id_product, 0x61f6);
        assert_eq!(decoded.device.bus_id, "1-1");
        assert_eq!(decoded.interface.class, 0x08);

        let header = DeviceListReply::header(&wire).unwrap();
        assert_eq!(header.version, USBIP_VERSION);
        assert_eq!(header.command, OP_REP_DEVLIST);
    }

    #[test]
    fn import_reply_roundtrip() {
        let reply = ImportReply::new(exported_device());
        let decoded = ImportReply::decode(&reply.encode().unwrap()).unwrap();
        assert_eq!(decoded, reply);
    }
}

mod submit {
    use super::*;

    fn sample_submit() -> CmdSubmit {
        CmdSubmit {
            command: USBIP_CMD_SUBMIT,
            seqnum: 0x1234,
            devid: 0x0001_0002,
            direction: 1,
            ep: 0,
            transfer_flags: 0x0200,
            transfer_buffer_length: 64,
            start_frame: 0,
            number_of_packets: 0,
            interval: 0,
            setup: [0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x40, 0x00],
        }
    }

    #[test]
    fn cmd_submit_roundtrip() {
        let cmd = sample_submit();
        let wire = cmd.encode().unwrap();
        assert_eq!(wire.len(), CmdSubmit::SIZE);
        assert_eq!(CmdSubmit::decode(&wire).unwrap(), cmd);
    }

    #[test]
    fn cmd_submit_rejects_envelope_with_payload_attached() {
        let mut wire = sample_submit().encode().unwrap();
        wire.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            CmdSubmit::decode(&wire),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn ret_submit_echoes_seqnum() {
        let reply = RetSubmit::new(0x1234, 0, vec![0; 64]);
        let decoded = RetSubmit::decode(&reply.encode().unwrap()).unwrap();
        assert_eq!(decoded.seqnum, 0x1234);
        assert_eq!(decoded.actual_length, 64);
        assert_eq!(decoded.status, 0);
    }

    #[test]
    fn transfer_request_parses_embedded_setup() {
        let cmd = sample_submit();
        let request = TransferRequest::from_submit(&cmd, Vec::new());
        assert_eq!(request.direction, Direction::In);

        let setup = SetupPacket::decode(&request.setup).unwrap();
        assert_eq!(setup.request, 0x06);
        assert_eq!(setup.descriptor_type(), 0x02);
        assert_eq!(setup.length, 64);
    }
}
