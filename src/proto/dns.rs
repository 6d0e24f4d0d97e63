use std::fmt;
use std::net::Ipv4Addr;
use dns_parser::{Packet, RData, ResourceRecord};
use log::trace;
use serde::{Serialize, Deserialize};

pub const PORT: u16 = 53;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub kind:  Kind,
    pub name:  String,
    pub value: Value,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Kind {
    A,
    NS,
    CNAME,
    MX,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Addr(Ipv4Addr),
    Name(String),
}

/// Extract the supported records from every section of a DNS response.
pub fn records(data: &[u8]) -> Vec<Record> {
    let packet = match Packet::parse(data) {
        Ok(packet) => packet,
        Err(e)     => {
            trace!("invalid dns packet: {}", e);
            return Vec::new();
        }
    };

    if packet.header.query {
        return Vec::new();
    }

    packet.answers.iter()
        .chain(packet.nameservers.iter())
        .chain(packet.additional.iter())
        .filter_map(record)
        .collect()
}

fn record(rr: &ResourceRecord<'_>) -> Option<Record> {
    let (kind, value) = match &rr.data {
        RData::A(a)     => (Kind::A,     Value::Addr(a.0)),
        RData::NS(ns)   => (Kind::NS,    Value::Name(ns.0.to_string())),
        RData::CNAME(c) => (Kind::CNAME, Value::Name(c.0.to_string())),
        RData::MX(mx)   => (Kind::MX,    Value::Name(mx.exchange.to_string())),
        _               => return None,
    };

    Some(Record {
        kind:  kind,
        name:  rr.name.to_string(),
        value: value,
    })
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Kind::A     => "A",
            Kind::NS    => "NS",
            Kind::CNAME => "CNAME",
            Kind::MX    => "MX",
        };
        f.write_str(s)
    }
}
