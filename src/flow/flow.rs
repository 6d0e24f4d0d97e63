use std::fmt;
use log::{trace, warn};
use serde::{Serialize, Deserialize};
use crate::capture::{Addr, Packet, Protocol, Timestamp, Transport};
use crate::capture::packet::{FIN, RST, SYN};
use crate::notify::FlowStats;
use crate::proto::{self, Decoded, Scheme};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Key(pub Protocol, pub Addr, pub Addr);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum State {
    Open,
    Closed,
    Abandoned,
}

#[derive(Copy, Clone, Debug)]
pub struct Limits {
    pub max_buffered: usize,
    pub max_payload:  usize,
    pub dedup:        bool,
    pub finalize:     bool,
}

/// One direction of a TCP or UDP connection.
///
/// `payload` only ever grows by contiguous data: TCP segments that arrive
/// ahead of the next expected sequence number wait in `buffer` until the
/// gap before them is filled.
#[derive(Debug)]
pub struct Flow {
    pub key:     Key,
    pub bytes:   usize,
    pub packets: usize,
    pub tls:     bool,
    pub first:   Timestamp,
    pub last:    Timestamp,
    state:       State,
    payload:     Vec<u8>,
    cleartext:   Vec<u8>,
    buffer:      Vec<(u32, Vec<u8>)>,
    buffered:    usize,
    next:        Option<u32>,
    fin:         Option<u32>,
    truncated:   bool,
    decoded:     Option<(Seen, Option<Decoded>)>,
    dirty:       bool,
}

type Seen = (usize, bool);

impl Key {
    pub fn reverse(&self) -> Key {
        Key(self.0, self.2, self.1)
    }
}

impl Flow {
    pub fn new(key: Key) -> Self {
        Self {
            key:       key,
            bytes:     0,
            packets:   0,
            tls:       false,
            first:     Timestamp::zero(),
            last:      Timestamp::zero(),
            state:     State::Open,
            payload:   Vec::new(),
            cleartext: Vec::new(),
            buffer:    Vec::new(),
            buffered:  0,
            next:      None,
            fin:       None,
            truncated: false,
            decoded:   None,
            dirty:     true,
        }
    }

    pub fn from_packet(pkt: &Packet<'_>, limits: &Limits) -> Self {
        let mut flow = Self::new(pkt.key());
        flow.add_packet(pkt, limits);
        flow
    }

    pub fn add_packet(&mut self, pkt: &Packet<'_>, limits: &Limits) {
        if self.packets == 0 {
            self.first = pkt.timestamp;
        }

        self.packets += 1;
        self.bytes   += pkt.bytes;
        self.last     = pkt.timestamp;
        self.dirty    = true;

        if self.state != State::Open {
            return;
        }

        match pkt.transport {
            Transport::TCP { seq, flags } => self.segment(seq, flags, pkt.payload, limits),
            Transport::UDP                => self.append(pkt.payload, limits),
        }
    }

    pub fn add_cleartext(&mut self, data: &[u8], limits: &Limits) {
        let room = limits.max_payload.saturating_sub(self.cleartext.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.cleartext.extend_from_slice(&data[..data.len().min(room)]);
        self.tls   = true;
        self.dirty = true;
    }

    /// Bytes of the logical stream: recovered cleartext for TLS flows,
    /// observed payload otherwise.
    pub fn payload(&self) -> &[u8] {
        match self.tls {
            true  => &self.cleartext,
            false => &self.payload,
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.payload
    }

    pub fn cleartext(&self) -> &[u8] {
        &self.cleartext
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn buffered(&self) -> usize {
        self.buffered
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn classify(&mut self) -> Option<&Decoded> {
        let seen  = (self.payload().len().min(proto::LIMIT), self.tls);
        let stale = match &self.decoded {
            Some((prev, _)) => *prev != seen,
            None            => true,
        };

        if stale {
            let decoded = proto::classify(self.payload(), Scheme::from_tls(self.tls));
            self.decoded = Some((seen, decoded));
        }

        self.decoded.as_ref().and_then(|(_, decoded)| decoded.as_ref())
    }

    pub fn stats(&self) -> FlowStats {
        FlowStats {
            id:        self.key.to_string(),
            protocol:  self.key.0,
            src:       self.key.1,
            dst:       self.key.2,
            bytes:     self.bytes,
            packets:   self.packets,
            tls:       self.tls,
            state:     self.state,
            buffered:  self.buffered,
            truncated: self.truncated,
            decoded:   self.decoded.as_ref().and_then(|(_, d)| d.clone()),
        }
    }

    pub(super) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn segment(&mut self, seq: u32, flags: u16, data: &[u8], limits: &Limits) {
        if flags & SYN != 0 {
            if self.next.is_none() {
                self.next = Some(seq.wrapping_add(1));
                self.drain(limits);
            }
            return;
        }

        let next = *self.next.get_or_insert(seq);

        if flags & RST != 0 && limits.finalize {
            self.state = State::Closed;
            return;
        }

        let end = seq.wrapping_add(data.len() as u32);
        if flags & FIN != 0 {
            self.fin = Some(end);
        }

        if !data.is_empty() {
            if seq == next {
                self.accept(data, limits);
                self.drain(limits);
            } else if limits.dedup && before(seq, next) {
                if before(next, end) {
                    let skip = next.wrapping_sub(seq) as usize;
                    self.accept(&data[skip..], limits);
                    self.drain(limits);
                } else {
                    trace!("{}: dropping retransmitted segment {}", self.key, seq);
                }
            } else {
                self.buffer(seq, data, limits);
            }
        }

        if limits.finalize && self.state == State::Open && self.fin.is_some() && self.fin == self.next {
            self.state = State::Closed;
        }
    }

    fn accept(&mut self, data: &[u8], limits: &Limits) {
        self.next = self.next.map(|n| n.wrapping_add(data.len() as u32));
        self.append(data, limits);
    }

    fn append(&mut self, data: &[u8], limits: &Limits) {
        let room = limits.max_payload.saturating_sub(self.payload.len());
        if data.len() > room {
            self.truncated = true;
        }
        self.payload.extend_from_slice(&data[..data.len().min(room)]);
    }

    fn buffer(&mut self, seq: u32, data: &[u8], limits: &Limits) {
        if limits.dedup && self.buffer.iter().any(|(s, d)| *s == seq && d.len() >= data.len()) {
            trace!("{}: dropping duplicate segment {}", self.key, seq);
            return;
        }

        self.buffered += data.len();
        self.buffer.push((seq, data.to_vec()));

        if self.buffered > limits.max_buffered {
            warn!("{}: abandoned with {} bytes out of order", self.key, self.buffered);
            self.state    = State::Abandoned;
            self.buffer   = Vec::new();
            self.buffered = 0;
        }
    }

    fn drain(&mut self, limits: &Limits) {
        while let Some(next) = self.next {
            let mut found = None;

            for (index, (seq, data)) in self.buffer.iter().enumerate() {
                let end = seq.wrapping_add(data.len() as u32);
                if *seq == next {
                    found = Some((index, 0));
                    break;
                } else if limits.dedup && before(*seq, next) {
                    let skip = match before(next, end) {
                        true  => next.wrapping_sub(*seq) as usize,
                        false => data.len(),
                    };
                    found = Some((index, skip));
                    break;
                }
            }

            let (index, skip) = match found {
                Some(found) => found,
                None        => break,
            };

            let (_, data) = self.buffer.swap_remove(index);
            self.buffered -= data.len();
            self.accept(&data[skip..], limits);
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.0, self.1, self.2)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_buffered: 1 << 20,
            max_payload:  16 << 20,
            dedup:        true,
            finalize:     true,
        }
    }
}

impl Packet<'_> {
    pub fn key(&self) -> Key {
        Key(self.protocol, self.src, self.dst)
    }
}

fn before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}
