//! Bridge between Firebase and a serial-attached gate controller.
//!
//! Two independent programs share this library:
//!
//! - `gate-poller` polls a Firestore document for the `gateClosed` flag and,
//!   when it is set, sends a single trigger byte to the controller board and
//!   clears the flag in the same cycle.
//! - `gate-listener` holds a streaming subscription to a Realtime Database
//!   path and forwards de-duplicated command strings to the board as
//!   newline-terminated lines.

pub mod device;
pub mod firebase;
pub mod listener;
pub mod poller;
