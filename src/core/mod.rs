//! Core, platform independent bridging code.

pub mod dev;
pub mod interface;
pub mod link;
pub mod neighbor;
pub mod nic;
pub mod repr;
pub mod socket;
pub mod stack;
