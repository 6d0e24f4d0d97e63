use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use anyhow::{Result, anyhow};
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use pcap::{Activated, Capture, Savefile};
use crate::sniff::Sniffer;
use super::{capture, Config, Link, Timestamp};
use pcap::Error::*;

pub struct Source {
    stop:    Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread:  Option<JoinHandle<()>>,
}

impl Source {
    pub fn spawn(cfg: Config, sniffer: Sniffer) -> Result<Self> {
        let stop    = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = bounded(1);

        let mut task = Task::new(cfg, sniffer, stop.clone());
        let done     = running.clone();

        let thread = thread::Builder::new().name("capture".into()).spawn(move || {
            let (cap, link) = match capture(&task.cfg) {
                Ok(opened) => opened,
                Err(e)     => {
                    let _ = tx.send(Err(e));
                    done.store(false, Ordering::Release);
                    return;
                }
            };
            let _ = tx.send(Ok(()));

            match task.poll(cap, link) {
                Ok(()) => debug!("capture finished"),
                Err(e) => warn!("capture stopped: {:?}", e),
            };

            task.sniffer.finish();
            done.store(false, Ordering::Release);
        })?;

        match rx.recv() {
            Ok(Ok(()))  => (),
            Ok(Err(e))  => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_)      => return Err(anyhow!("capture thread exited")),
        }

        Ok(Self {
            stop:    stop,
            running: running,
            thread:  Some(thread),
        })
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Task {
    cfg:     Config,
    sniffer: Sniffer,
    stop:    Arc<AtomicBool>,
}

impl Task {
    fn new(cfg: Config, sniffer: Sniffer, stop: Arc<AtomicBool>) -> Self {
        Self { cfg, sniffer, stop }
    }

    fn poll(&mut self, mut cap: Capture<dyn Activated>, link: Link) -> Result<()> {
        let mut dump = self.dump(&cap);

        while !self.stop.load(Ordering::Acquire) {
            match cap.next() {
                Ok(packet)          => {
                    if let Some(file) = dump.as_mut() {
                        file.write(&packet);
                    }
                    self.sniffer.record(link, &packet);
                }
                Err(TimeoutExpired) => self.sniffer.tick(Timestamp::now()),
                Err(NoMorePackets)  => break,
                Err(e)              => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn dump(&self, cap: &Capture<dyn Activated>) -> Option<Savefile> {
        let path = self.cfg.dump.as_ref()?;
        match cap.savefile(path) {
            Ok(file) => {
                info!("writing packets to {}", path.display());
                Some(file)
            }
            Err(e) => {
                warn!("savefile {} failed: {}", path.display(), e);
                None
            }
        }
    }
}
