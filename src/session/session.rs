use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use anyhow::Result;
use crossbeam_channel::{bounded, Receiver};
use log::{debug, info};
use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use crate::capture::Source;
use crate::flow::FlowTable;
use crate::graph::Graph;
use crate::intercept::{Correlation, Intercept, Tls};
use crate::notify::Event;
use crate::sniff::Sniffer;
use super::{Config, Status};

/// A running capture: the capture thread, the optional intercepting proxy
/// and the shared state both of them feed.
pub struct Session {
    rt:          Option<Runtime>,
    source:      Source,
    events:      Receiver<Event>,
    flows:       Arc<FlowTable>,
    correlation: Arc<Correlation>,
    graph:       Graph,
    packets:     Arc<AtomicU64>,
    stop:        watch::Sender<bool>,
}

impl Session {
    pub fn start(cfg: Config) -> Result<Self> {
        let rt = Builder::new_multi_thread()
            .enable_all()
            .thread_name("flowtap")
            .build()?;

        let (tx, rx) = bounded(cfg.events);

        let mut graph = Graph::new(tx, cfg.tags);
        if cfg.resolve {
            graph = graph.resolver(rt.handle().clone());
        }

        let flows       = Arc::new(FlowTable::new(cfg.limits));
        let ttl         = cfg.intercept.as_ref().map_or(Duration::from_secs(5), |c| c.wait);
        let correlation = Arc::new(Correlation::new(ttl));
        let (stop, watch) = watch::channel(false);

        let register = match &cfg.intercept {
            Some(icfg) => {
                let tls      = Tls::load(icfg)?;
                let listener = rt.block_on(TcpListener::bind(icfg.listen))?;
                let proxy    = Intercept::new(tls, icfg, correlation.clone(), flows.clone(), graph.clone());
                rt.spawn(Arc::new(proxy).serve(listener, watch));
                Some(correlation.clone())
            }
            None => None,
        };

        let interval = cfg.capture.interval;
        let sniffer  = Sniffer::new(cfg.tls_ports, flows.clone(), register, graph.clone(), interval);
        let packets  = sniffer.packets();
        let source   = Source::spawn(cfg.capture, sniffer)?;

        info!("session started");

        Ok(Self {
            rt:          Some(rt),
            source:      source,
            events:      rx,
            flows:       flows,
            correlation: correlation,
            graph:       graph,
            packets:     packets,
            stop:        stop,
        })
    }

    pub fn events(&self) -> Receiver<Event> {
        self.events.clone()
    }

    pub fn status(&self) -> Status {
        Status {
            running: self.source.running(),
            packets: self.packets.load(Ordering::Relaxed),
            flows:   self.flows.len(),
            nodes:   self.graph.nodes(),
            edges:   self.graph.edges(),
            pending: self.correlation.pending(),
        }
    }

    pub fn stop(&mut self) {
        let rt = match self.rt.take() {
            Some(rt) => rt,
            None     => return,
        };

        self.source.stop();

        let _ = self.stop.send(true);
        self.correlation.clear();

        rt.shutdown_timeout(Duration::from_secs(1));

        self.flows.clear();

        if self.graph.dropped() > 0 {
            debug!("{} events dropped", self.graph.dropped());
        }

        info!("session stopped");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
