//! Software-defined USB device model
//!
//! Descriptor entities, the per-device [`DeviceModel`] with its derived
//! raw-configuration blob, the [`UsbDevice`] capability implemented by
//! concrete profiles, and the profiles themselves. The session engine
//! resolves standard control requests against the model and forwards
//! everything else through the capability trait.

pub mod descriptors;
pub mod error;
pub mod handler;
pub mod model;
pub mod profiles;
pub mod strings;

pub use descriptors::{
    Bos, Configuration, DeviceDescriptor, DeviceQualifier, Endpoint, Interface,
};
pub use error::{DescriptorError, Result};
pub use handler::{ControlOutcome, UsbDevice};
pub use model::DeviceModel;
pub use strings::{LANG_EN_US, StringTable};
