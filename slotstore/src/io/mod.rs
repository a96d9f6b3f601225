//! Side-effecting collaborators: byte codecs, slot storage and configuration.

pub mod codec;
pub mod config;
pub mod storage;

mod atomic;
