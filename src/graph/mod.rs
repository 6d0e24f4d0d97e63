use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub kind:  Kind,
    pub value: String,
    pub tags:  BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Ip,
    Hostname,
    Url,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src:   Node,
    pub dst:   Node,
    pub label: String,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.value)
    }
}

pub use graph::Graph;

mod graph;

#[cfg(test)]
mod test;
