use std::collections::HashMap;
use log::debug;
use parking_lot::Mutex;
use crate::capture::Packet;
use crate::capture::packet::SYN;
use crate::notify::FlowStats;
use crate::proto::Decoded;
use super::{Flow, Key, Limits, State};

pub struct FlowTable {
    flows:  Mutex<HashMap<Key, Flow>>,
    limits: Limits,
}

impl FlowTable {
    pub fn new(limits: Limits) -> Self {
        Self {
            flows:  Mutex::new(HashMap::new()),
            limits: limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Apply a captured packet to its flow, creating the flow on first
    /// sight, and return the flow's current classification.
    pub fn record(&self, pkt: &Packet<'_>) -> Option<Decoded> {
        let key = pkt.key();
        let mut flows = self.flows.lock();

        let tls = flows.get(&key.reverse()).map_or(false, |f| f.tls);

        let flow = flows.entry(key).or_insert_with(|| Flow::new(key));
        if flow.state() != State::Open && pkt.tcp_flags() & SYN != 0 && self.limits.finalize {
            debug!("{}: restarted", key);
            *flow = Flow::new(key);
        }

        flow.tls |= tls;
        flow.add_packet(pkt, &self.limits);
        flow.classify().cloned()
    }

    pub fn mark_tls(&self, key: Key) {
        let mut flows = self.flows.lock();
        flows.entry(key).or_insert_with(|| Flow::new(key)).tls = true;
    }

    /// Append recovered cleartext to a flow and reclassify it.
    pub fn cleartext(&self, key: Key, data: &[u8]) -> Option<Decoded> {
        let mut flows = self.flows.lock();
        let flow = flows.entry(key).or_insert_with(|| Flow::new(key));
        flow.add_cleartext(data, &self.limits);
        flow.classify().cloned()
    }

    pub fn with<T, F: FnOnce(&Flow) -> T>(&self, key: &Key, f: F) -> Option<T> {
        self.flows.lock().get(key).map(f)
    }

    /// Statistics of flows changed since the last call, or of every flow
    /// when `all` is set.
    pub fn stats(&self, all: bool) -> Vec<FlowStats> {
        let mut flows = self.flows.lock();
        flows.values_mut().filter_map(|flow| {
            let dirty = flow.take_dirty();
            match all || dirty {
                true  => Some(flow.stats()),
                false => None,
            }
        }).collect()
    }

    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.lock().is_empty()
    }

    pub fn clear(&self) {
        self.flows.lock().clear();
    }
}
