use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use crossbeam_channel::Sender;
use dns_lookup::lookup_addr;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use crate::notify::{Event, FlowStats};
use crate::proto::Request;
use crate::proto::dns::{Record, Value};
use super::{Edge, Kind, Node};
use crossbeam_channel::TrySendError::*;

type NodeKey = (Kind, String);
type EdgeKey = (NodeKey, NodeKey, String);

/// Turns observations into graph nodes and edges, each published once per
/// session on the event channel.
#[derive(Clone)]
pub struct Graph {
    tx:      Sender<Event>,
    tags:    Arc<BTreeSet<String>>,
    seen:    Arc<Mutex<Seen>>,
    resolve: Option<Handle>,
}

#[derive(Default)]
struct Seen {
    nodes:   HashSet<NodeKey>,
    edges:   HashSet<EdgeKey>,
    dropped: usize,
    full:    bool,
}

impl Graph {
    pub fn new(tx: Sender<Event>, tags: Vec<String>) -> Self {
        Self {
            tx:      tx,
            tags:    Arc::new(tags.into_iter().collect()),
            seen:    Arc::new(Mutex::new(Seen::default())),
            resolve: None,
        }
    }

    pub fn resolver(mut self, handle: Handle) -> Self {
        self.resolve = Some(handle);
        self
    }

    pub fn node(&self, kind: Kind, value: String) -> Node {
        Node {
            kind:  kind,
            value: value,
            tags:  (*self.tags).clone(),
        }
    }

    pub fn add_node(&self, node: &Node) -> bool {
        let key      = (node.kind, node.value.clone());
        let mut seen = self.seen.lock();
        if seen.nodes.contains(&key) {
            return false;
        }

        trace!("node {}", node);
        if !seen.publish(&self.tx, Event::Node(node.clone())) {
            return false;
        }
        seen.nodes.insert(key)
    }

    pub fn add_edge(&self, src: &Node, dst: &Node, label: &str) -> bool {
        self.add_node(src);
        self.add_node(dst);

        let key      = ((src.kind, src.value.clone()), (dst.kind, dst.value.clone()), label.to_owned());
        let mut seen = self.seen.lock();
        if seen.edges.contains(&key) {
            return false;
        }

        trace!("edge {} -[{}]-> {}", src, label, dst);
        let edge = Edge {
            src:   src.clone(),
            dst:   dst.clone(),
            label: label.to_owned(),
        };
        if !seen.publish(&self.tx, Event::Edge(edge)) {
            return false;
        }
        seen.edges.insert(key)
    }

    /// Record an address, resolving a hostname for it in the background
    /// the first time it is seen.
    pub fn addr(&self, addr: IpAddr) {
        let node = self.node(Kind::Ip, addr.to_string());
        if !self.add_node(&node) {
            return;
        }

        if let Some(handle) = &self.resolve {
            let graph = self.clone();
            handle.spawn_blocking(move || graph.reverse(addr, node));
        }
    }

    pub fn dns(&self, records: &[Record]) {
        for r in records {
            let name  = self.node(Kind::Hostname, r.name.clone());
            let value = match &r.value {
                Value::Addr(addr) => self.node(Kind::Ip, addr.to_string()),
                Value::Name(name) => self.node(Kind::Hostname, name.clone()),
            };
            self.add_edge(&name, &value, &r.kind.to_string());
        }
    }

    pub fn http(&self, req: &Request) {
        let (host, url) = match (&req.host, &req.url) {
            (Some(host), Some(url)) => (host, url),
            _                       => return,
        };

        let host = self.node(Kind::Hostname, hostname(host).to_owned());
        let url  = self.node(Kind::Url, url.clone());
        self.add_edge(&url, &host, "host");
    }

    pub fn flow(&self, stats: FlowStats) {
        self.seen.lock().publish(&self.tx, Event::Flow(stats));
    }

    pub fn nodes(&self) -> usize {
        self.seen.lock().nodes.len()
    }

    pub fn edges(&self) -> usize {
        self.seen.lock().edges.len()
    }

    pub fn dropped(&self) -> usize {
        self.seen.lock().dropped
    }

    fn reverse(&self, addr: IpAddr, node: Node) {
        match lookup_addr(&addr) {
            Ok(name) if name != node.value => {
                let host = self.node(Kind::Hostname, name);
                self.add_edge(&host, &node, "reverse");
            }
            Ok(_)  => trace!("no name for {}", addr),
            Err(e) => debug!("reverse lookup of {} failed: {}", addr, e),
        }
    }
}

impl Seen {
    /// Returns false when the event was dropped on a full channel. Only the
    /// first drop after the channel fills is logged.
    fn publish(&mut self, tx: &Sender<Event>, event: Event) -> bool {
        match tx.try_send(event) {
            Ok(_)                => {
                if self.full {
                    debug!("event channel drained, {} dropped so far", self.dropped);
                    self.full = false;
                }
                true
            }
            Err(Full(_))         => {
                if !self.full {
                    warn!("event channel full, dropping events");
                    self.full = true;
                }
                self.dropped += 1;
                false
            }
            Err(Disconnected(_)) => {
                trace!("event channel closed");
                true
            }
        }
    }
}

fn hostname(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() => name,
        _                                                 => host,
    }
}
