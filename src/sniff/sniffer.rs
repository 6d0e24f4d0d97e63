use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use log::{debug, trace};
use crate::capture::{self, Link, Packet, Protocol, Timer, Timestamp, Transport};
use crate::flow::FlowTable;
use crate::graph::Graph;
use crate::intercept::{Correlation, Target};
use crate::proto::{dns, Decoded};

/// Consumes captured packets: feeds flows, DNS answers and HTTP requests
/// into the graph and registers TLS handshakes for interception.
pub struct Sniffer {
    tls_ports:   Arc<HashSet<u16>>,
    flows:       Arc<FlowTable>,
    correlation: Option<Arc<Correlation>>,
    graph:       Graph,
    timer:       Timer,
    packets:     Arc<AtomicU64>,
}

impl Sniffer {
    pub fn new(
        tls_ports:   HashSet<u16>,
        flows:       Arc<FlowTable>,
        correlation: Option<Arc<Correlation>>,
        graph:       Graph,
        interval:    Duration,
    ) -> Self {
        Self {
            tls_ports:   Arc::new(tls_ports),
            flows:       flows,
            correlation: correlation,
            graph:       graph,
            timer:       Timer::new(interval),
            packets:     Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared count of decoded packets.
    pub fn packets(&self) -> Arc<AtomicU64> {
        self.packets.clone()
    }

    pub fn record(&mut self, link: Link, cap: &pcap::Packet<'_>) {
        match capture::decode(link, cap) {
            Some(pkt) => self.process(&pkt),
            None      => trace!("skipped {} byte frame", cap.data.len()),
        }
    }

    pub fn process(&mut self, pkt: &Packet<'_>) {
        self.packets.fetch_add(1, Ordering::Relaxed);

        self.graph.addr(pkt.src.addr);
        self.graph.addr(pkt.dst.addr);

        if pkt.protocol == Protocol::UDP && pkt.src.port == dns::PORT {
            let records = dns::records(pkt.payload);
            if !records.is_empty() {
                trace!("{} DNS records from {}", records.len(), pkt.src);
                self.graph.dns(&records);
            }
        }

        if let Some(Decoded::Request(req)) = self.flows.record(pkt) {
            self.graph.http(&req);
        }

        if let Transport::TCP { .. } = pkt.transport {
            if pkt.is_syn() && self.tls_ports.contains(&pkt.dst.port) {
                self.handshake(pkt);
            }
        }

        self.tick(pkt.timestamp);
    }

    pub fn tick(&mut self, ts: Timestamp) {
        if self.timer.ready(ts) {
            for stats in self.flows.stats(false) {
                self.graph.flow(stats);
            }
        }
    }

    pub fn finish(&mut self) {
        let stats = self.flows.stats(true);
        debug!("publishing {} flows", stats.len());
        for stats in stats {
            self.graph.flow(stats);
        }
    }

    fn handshake(&self, pkt: &Packet<'_>) {
        let key = pkt.key();

        self.flows.mark_tls(key);

        if let Some(correlation) = &self.correlation {
            let client = SocketAddr::from(pkt.src);
            debug!("{}: TLS handshake from {}", key, client);
            correlation.register(client, Target {
                server: pkt.dst.into(),
                key:    key,
            });
        }
    }
}
