//! Helpers shared by the library's unit tests.

pub mod scripted;
pub mod socket_guard;
