use std::net::SocketAddrV4;
use std::time::Duration;
use pnet::packet::ethernet::{EtherType, EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::tcp::MutableTcpPacket;
use pnet::packet::udp::MutableUdpPacket;
use pnet::packet::vlan::MutableVlanPacket;
use super::{parse, Link, Packet, Timestamp};

pub fn ts(secs: u64) -> Timestamp {
    Timestamp(Duration::from_secs(secs))
}

pub fn tcp(src: &str, dst: &str, seq: u32, flags: u16, payload: &[u8]) -> Vec<u8> {
    let (src, dst) = addrs(src, dst);

    let mut body = vec![0u8; 20 + payload.len()];
    let mut seg  = MutableTcpPacket::new(&mut body).expect("tcp");
    seg.set_source(src.port());
    seg.set_destination(dst.port());
    seg.set_sequence(seq);
    seg.set_data_offset(5);
    seg.set_flags(flags);
    seg.set_window(65535);
    seg.set_payload(payload);

    ipv4(src, dst, IpNextHeaderProtocols::Tcp, &body)
}

pub fn udp(src: &str, dst: &str, payload: &[u8]) -> Vec<u8> {
    let (src, dst) = addrs(src, dst);

    let mut body = vec![0u8; 8 + payload.len()];
    let mut dgram = MutableUdpPacket::new(&mut body).expect("udp");
    dgram.set_source(src.port());
    dgram.set_destination(dst.port());
    dgram.set_length(body_len(8, payload));
    dgram.set_payload(payload);

    ipv4(src, dst, IpNextHeaderProtocols::Udp, &body)
}

pub fn ipv4(src: SocketAddrV4, dst: SocketAddrV4, proto: IpNextHeaderProtocol, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 20 + body.len()];
    let mut ip   = MutableIpv4Packet::new(&mut data).expect("ipv4");
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(body_len(20, body));
    ip.set_ttl(64);
    ip.set_next_level_protocol(proto);
    ip.set_source(*src.ip());
    ip.set_destination(*dst.ip());
    ip.set_payload(body);
    data
}

pub fn ethernet(ethertype: EtherType, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 14 + body.len()];
    let mut eth  = MutableEthernetPacket::new(&mut data).expect("ethernet");
    eth.set_ethertype(ethertype);
    eth.set_payload(body);
    data
}

pub fn vlan(id: u16, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 4 + body.len()];
    let mut tag  = MutableVlanPacket::new(&mut data).expect("vlan");
    tag.set_vlan_identifier(id);
    tag.set_ethertype(EtherTypes::Ipv4);
    tag.set_payload(body);
    ethernet(EtherTypes::Vlan, &data)
}

pub fn cooked(proto: u16, body: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 16];
    data[14..16].copy_from_slice(&proto.to_be_bytes());
    data.extend_from_slice(body);
    data
}

pub fn packet(frame: &[u8], secs: u64) -> Packet<'_> {
    parse(Link::Raw, ts(secs), frame).expect("valid frame")
}

fn addrs(src: &str, dst: &str) -> (SocketAddrV4, SocketAddrV4) {
    (src.parse().expect("src"), dst.parse().expect("dst"))
}

fn body_len(header: usize, body: &[u8]) -> u16 {
    (header + body.len()) as u16
}
