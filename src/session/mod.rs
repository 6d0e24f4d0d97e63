use std::collections::HashSet;
use serde::{Serialize, Deserialize};
use crate::capture;
use crate::flow::Limits;
use crate::intercept;

pub use session::Session;

#[derive(Debug)]
pub struct Config {
    pub capture:   capture::Config,
    pub intercept: Option<intercept::Config>,
    pub limits:    Limits,
    pub tls_ports: HashSet<u16>,
    pub resolve:   bool,
    pub tags:      Vec<String>,
    pub events:    usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub running: bool,
    pub packets: u64,
    pub flows:   usize,
    pub nodes:   usize,
    pub edges:   usize,
    pub pending: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture:   capture::Config::default(),
            intercept: None,
            limits:    Limits::default(),
            tls_ports: vec![443].into_iter().collect(),
            resolve:   false,
            tags:      Vec::new(),
            events:    10_000,
        }
    }
}

mod session;

#[cfg(test)]
mod test;
