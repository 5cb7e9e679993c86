//! Serial link abstraction.
//!
//! The transport session talks to a `SerialPortAdapter`; production code hands
//! it a `SyncSerialPort`, tests hand it a `MockSerialPort`.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::SyncSerialPort;
pub use traits::*;
