use std::fmt;
use std::net::{IpAddr, SocketAddr};
use serde::{Serialize, Deserialize};
use super::Timestamp;

pub const FIN: u16 = 0b00001;
pub const SYN: u16 = 0b00010;
pub const RST: u16 = 0b00100;
pub const ACK: u16 = 0b10000;

#[derive(Clone, Debug)]
pub struct Packet<'a> {
    pub timestamp: Timestamp,
    pub protocol:  Protocol,
    pub src:       Addr,
    pub dst:       Addr,
    pub transport: Transport,
    pub bytes:     usize,
    pub payload:   &'a [u8],
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum Protocol {
    TCP,
    UDP,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Addr {
    pub addr: IpAddr,
    pub port: u16,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Transport {
    TCP { seq: u32, flags: u16 },
    UDP,
}

impl Packet<'_> {
    pub fn tcp_flags(&self) -> u16 {
        match self.transport {
            Transport::TCP { flags, .. } => flags,
            Transport::UDP               => 0,
        }
    }

    pub fn is_syn(&self) -> bool {
        self.tcp_flags() & (SYN | ACK) == SYN
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::TCP => f.write_str("tcp"),
            Protocol::UDP => f.write_str("udp"),
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl From<SocketAddr> for Addr {
    fn from(sa: SocketAddr) -> Self {
        Self {
            addr: sa.ip(),
            port: sa.port(),
        }
    }
}

impl From<Addr> for SocketAddr {
    fn from(addr: Addr) -> Self {
        SocketAddr::new(addr.addr, addr.port)
    }
}
