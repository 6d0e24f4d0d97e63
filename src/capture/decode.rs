use std::net::IpAddr;
use pnet::packet::PacketSize;
use pnet::packet::ethernet::{EthernetPacket, EtherTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use super::{Timestamp, packet::*};

const COOKED_HEADER: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Link {
    Ethernet,
    Raw,
    Cooked,
}

pub fn decode<'a>(link: Link, cap: &'a pcap::Packet<'a>) -> Option<Packet<'a>> {
    let ts = Timestamp::from_timeval(cap.header.ts.tv_sec as i64, cap.header.ts.tv_usec as i64);
    parse(link, ts, cap.data)
}

pub fn parse(link: Link, ts: Timestamp, data: &[u8]) -> Option<Packet<'_>> {
    let payload = match link {
        Link::Ethernet => ethernet(data)?,
        Link::Raw      => data,
        Link::Cooked   => cooked(data)?,
    };
    ipv4(ts, payload)
}

fn ethernet(data: &[u8]) -> Option<&[u8]> {
    let eth = EthernetPacket::new(data)?;

    let mut ethertype = eth.get_ethertype();
    let mut offset    = EthernetPacket::minimum_packet_size();

    while ethertype == EtherTypes::Vlan {
        let pkt = VlanPacket::new(data.get(offset..)?)?;
        ethertype = pkt.get_ethertype();
        offset   += pkt.packet_size();
    }

    match ethertype {
        EtherTypes::Ipv4 => data.get(offset..),
        _                => None,
    }
}

fn cooked(data: &[u8]) -> Option<&[u8]> {
    let proto = data.get(14..COOKED_HEADER)?;
    match u16::from_be_bytes([proto[0], proto[1]]) {
        0x0800 => data.get(COOKED_HEADER..),
        _      => None,
    }
}

fn ipv4(ts: Timestamp, data: &[u8]) -> Option<Packet<'_>> {
    let ip = Ipv4Packet::new(data)?;

    if ip.get_version() != 4 {
        return None;
    }

    let header = ip.get_header_length() as usize * 4;
    let total  = ip.get_total_length() as usize;
    if header < Ipv4Packet::minimum_packet_size() || total < header {
        return None;
    }

    if ip.get_fragment_offset() != 0 {
        return None;
    }

    let end  = total.min(data.len());
    let body = data.get(header..end)?;

    let src = IpAddr::V4(ip.get_source());
    let dst = IpAddr::V4(ip.get_destination());

    let (protocol, transport, sport, dport, payload) = match ip.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => tcp(body)?,
        IpNextHeaderProtocols::Udp => udp(body)?,
        _                          => return None,
    };

    Some(Packet {
        timestamp: ts,
        protocol:  protocol,
        src:       Addr { addr: src, port: sport },
        dst:       Addr { addr: dst, port: dport },
        transport: transport,
        bytes:     total,
        payload:   payload,
    })
}

type Segment<'a> = (Protocol, Transport, u16, u16, &'a [u8]);

fn tcp(body: &[u8]) -> Option<Segment<'_>> {
    let tcp    = TcpPacket::new(body)?;
    let offset = tcp.get_data_offset() as usize * 4;

    if offset < TcpPacket::minimum_packet_size() {
        return None;
    }

    let seq   = tcp.get_sequence();
    let flags = tcp.get_flags();

    let transport = Transport::TCP { seq, flags };
    let payload   = body.get(offset..)?;

    Some((Protocol::TCP, transport, tcp.get_source(), tcp.get_destination(), payload))
}

fn udp(body: &[u8]) -> Option<Segment<'_>> {
    let udp = UdpPacket::new(body)?;
    let len = (udp.get_length() as usize).min(body.len());

    let payload = match len {
        n if n >= 8 => &body[8..n],
        _           => return None,
    };

    Some((Protocol::UDP, Transport::UDP, udp.get_source(), udp.get_destination(), payload))
}
