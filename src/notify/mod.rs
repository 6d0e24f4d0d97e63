use serde::{Serialize, Deserialize};
use crate::capture::{Addr, Protocol};
use crate::flow::State;
use crate::graph::{Edge, Node};
use crate::proto::Decoded;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Node(Node),
    Edge(Edge),
    Flow(FlowStats),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowStats {
    pub id:        String,
    pub protocol:  Protocol,
    pub src:       Addr,
    pub dst:       Addr,
    pub bytes:     usize,
    pub packets:   usize,
    pub tls:       bool,
    pub state:     State,
    pub buffered:  usize,
    pub truncated: bool,
    pub decoded:   Option<Decoded>,
}

pub use dispatch::Notifier;

mod dispatch;
