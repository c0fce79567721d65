//! Capability implemented by concrete emulated devices

use protocol::{SetupPacket, TransferRequest};

use crate::model::DeviceModel;

/// Outcome of a device-specific control request.
///
/// Unrecognized requests are a value, not an error: the dispatcher turns
/// `Unsupported` into a stall-equivalent reply on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The device produced a reply payload (possibly empty).
    Handled(Vec<u8>),
    /// The device does not recognize the request.
    Unsupported,
}

/// A software-defined USB device.
///
/// The session engine resolves standard control requests against
/// [`DeviceModel`] itself; everything else lands here.
pub trait UsbDevice: Send {
    /// Descriptor tree served for standard control requests.
    fn model(&self) -> &DeviceModel;

    /// Non-control endpoint transfer. Returns the reply payload; empty
    /// for OUT transfers.
    fn handle_data(&mut self, request: &TransferRequest) -> Vec<u8>;

    /// Control requests the standard dispatcher does not resolve
    /// (class- and vendor-specific traffic).
    fn handle_device_specific_control(
        &mut self,
        setup: &SetupPacket,
        request: &TransferRequest,
    ) -> ControlOutcome;
}
