//! Concrete emulated device profiles

mod loopback;
mod storage;

pub use loopback::Loopback;
pub use storage::PortableSsd;
