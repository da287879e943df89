//! GNS Auth Session Models
//!
//! All data structures exchanged by the pairing engine, its HTTP surface
//! and the client agents.

pub mod browser_session;
pub mod message_sync;
pub mod qr;
pub mod requests;
pub mod session;

pub use browser_session::*;
pub use message_sync::*;
pub use qr::*;
pub use requests::*;
pub use session::*;
