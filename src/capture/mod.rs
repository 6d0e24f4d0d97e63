pub mod decode;
pub mod packet;
pub mod timer;

pub use capture::capture;
pub use config::{Config, Input};
pub use decode::{decode, parse, Link};
pub use filter::Filter;
pub use packet::{Addr, Packet, Protocol, Transport};
pub use source::Source;
pub use timer::{Timer, Timestamp};

mod capture;
mod config;
mod filter;
mod source;

#[cfg(test)]
pub mod build;
