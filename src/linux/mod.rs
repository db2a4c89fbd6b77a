//! Linux specific devices.

pub mod libc;
pub mod tap;
