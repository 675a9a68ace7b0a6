//! Shared helpers: aligned buffers, verification, timing, logging

pub mod buffer;
pub mod logging;
pub mod time;
pub mod verification;
