//! Session storage.
//!
//! Holds one record per started session: its state, latest QR image,
//! connection time and the underlying client it owns.

mod memory;
mod session;
mod traits;

pub use memory::*;
pub use session::*;
pub use traits::*;
