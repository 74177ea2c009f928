//! RoServer Core - Fundamental types and utilities

mod error;
mod idgen;
mod packetver;
mod timer;
mod types;

pub use error::*;
pub use idgen::*;
pub use packetver::*;
pub use timer::*;
pub use types::*;
