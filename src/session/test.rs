use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use anyhow::Result;
use crate::capture::{self, Input};
use crate::capture::build;
use crate::capture::packet::{ACK, SYN};
use crate::graph::Kind;
use crate::notify::Event;
use super::{Config, Session};

const LINKTYPE_RAW: u32 = 101;

fn savefile(name: &str, frames: &[Vec<u8>]) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("flowtap-{}-{}.pcap", std::process::id(), name));

    let mut data = Vec::new();
    data.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&4u16.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&65535u32.to_le_bytes());
    data.extend_from_slice(&LINKTYPE_RAW.to_le_bytes());

    for (n, frame) in frames.iter().enumerate() {
        let len = frame.len() as u32;
        data.extend_from_slice(&(1_600_000_000 + n as u32).to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(frame);
    }

    fs::write(&path, data)?;
    Ok(path)
}

fn replay(session: &Session) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.status().running && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
}

fn config(path: PathBuf) -> Config {
    let mut cfg = Config::default();
    cfg.capture = capture::Config {
        input: Input::File(path),
        ..capture::Config::default()
    };
    cfg
}

fn answer() -> Vec<u8> {
    let mut pkt = vec![
        0x00, 0x07, 0x81, 0x80,
        0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
    ];
    pkt.extend(b"\x04host\x04test\x00");
    pkt.extend(&[0x00, 0x01, 0x00, 0x01]);
    pkt.extend(&[0xc0, 0x0c, 0x00, 0x01, 0x00, 0x01]);
    pkt.extend(&[0x00, 0x00, 0x00, 0x3c, 0x00, 0x04]);
    pkt.extend(&[192, 0, 2, 80]);
    pkt
}

#[test]
fn start_missing_file() {
    let cfg = config(PathBuf::from("/nonexistent/capture.pcap"));
    assert!(Session::start(cfg).is_err());
}

#[test]
fn start_bad_certificate() -> Result<()> {
    let path = savefile("cert", &[])?;
    let mut cfg = config(path);
    cfg.intercept = Some(crate::intercept::Config::new(
        "127.0.0.1:0".parse()?,
        PathBuf::from("/nonexistent/cert.pem"),
        PathBuf::from("/nonexistent/key.pem"),
    ));
    assert!(Session::start(cfg).is_err());
    Ok(())
}

#[test]
fn replay_savefile() -> Result<()> {
    let request = b"GET /index.html HTTP/1.1\r\nHost: host.test\r\n\r\n";
    let frames  = vec![
        build::udp("10.0.0.1:53", "10.0.0.2:5353", &answer()),
        build::tcp("10.0.0.2:40000", "192.0.2.80:80", 1000, SYN, b""),
        build::tcp("192.0.2.80:80", "10.0.0.2:40000", 7000, SYN | ACK, b""),
        build::tcp("10.0.0.2:40000", "192.0.2.80:80", 1001, ACK, request),
    ];
    let path = savefile("replay", &frames)?;

    let mut session = Session::start(config(path))?;
    let events      = session.events();

    replay(&session);

    let status = session.status();
    assert!(!status.running);
    assert_eq!(4, status.packets);
    assert_eq!(3, status.flows);
    assert_eq!(2, status.edges);
    assert_eq!(0, status.pending);

    session.stop();
    assert_eq!(0, session.status().flows);

    let mut edges = Vec::new();
    let mut flows = Vec::new();
    for event in events.try_iter() {
        match event {
            Event::Edge(edge) => edges.push((edge.src.kind, edge.label, edge.dst.value)),
            Event::Flow(flow) => flows.push(flow.id),
            Event::Node(_)    => (),
        }
    }

    assert!(edges.contains(&(Kind::Hostname, "A".to_owned(), "192.0.2.80".to_owned())));
    assert!(edges.contains(&(Kind::Url, "host".to_owned(), "host.test".to_owned())));
    assert!(flows.contains(&"tcp:10.0.0.2:40000-192.0.2.80:80".to_owned()));

    Ok(())
}

#[test]
fn replay_writes_savefile() -> Result<()> {
    let frames = vec![
        build::tcp("10.0.0.2:40000", "192.0.2.80:80", 1000, SYN, b""),
        build::tcp("192.0.2.80:80", "10.0.0.2:40000", 7000, SYN | ACK, b""),
        build::tcp("10.0.0.2:40000", "192.0.2.80:80", 1001, ACK, b"ping"),
        build::udp("10.0.0.2:5353", "10.0.0.1:53", b"query"),
    ];
    let path = savefile("dump-in", &frames)?;
    let out  = std::env::temp_dir().join(format!("flowtap-{}-dump-out.pcap", std::process::id()));

    let mut cfg = config(path);
    cfg.capture.dump = Some(out.clone());

    let mut session = Session::start(cfg)?;
    replay(&session);
    assert!(!session.status().running);
    session.stop();

    let mut cap = pcap::Capture::from_file(&out)?;
    assert_eq!(LINKTYPE_RAW as i32, cap.get_datalink().0);

    let mut written = Vec::new();
    while let Ok(packet) = cap.next() {
        written.push(packet.data.to_vec());
    }
    assert_eq!(frames, written);

    fs::remove_file(&out)?;

    Ok(())
}
