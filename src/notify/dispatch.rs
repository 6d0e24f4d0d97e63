use std::time::Duration;
use futures_util::sink::SinkExt;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{Receiver, Sender, channel, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_serde::{SymmetricallyFramed, formats::SymmetricalJson};
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use super::Event;

/// Forwards events to a remote listener as length-delimited JSON frames,
/// reconnecting whenever the connection drops.
pub struct Notifier {
    tx:   Sender<Event>,
    task: JoinHandle<()>,
}

impl Notifier {
    pub fn new(addr: String, handle: &Handle) -> Self {
        let (tx, rx) = channel(1024);
        let task = handle.spawn(dispatch(addr, rx));
        Self { tx, task }
    }

    pub fn send(&self, event: Event) -> Result<(), TrySendError<Event>> {
        self.tx.try_send(event)
    }

    /// Wait for queued events to be written.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!("notifier task failed: {}", e);
        }
    }
}

async fn dispatch(addr: String, mut rx: Receiver<Event>) {
    let mut pending = None;

    loop {
        let sock = connect(&addr).await;

        let mut length = LengthDelimitedCodec::new();
        length.set_max_frame_length(32 * 1024 * 1024);
        let framed = FramedWrite::new(sock, length);
        let format = SymmetricalJson::default();

        let mut codec = SymmetricallyFramed::new(framed, format);

        loop {
            let event = match pending.take() {
                Some(event) => event,
                None        => match rx.recv().await {
                    Some(event) => event,
                    None        => {
                        debug!("notifier {} finished", addr);
                        return;
                    }
                },
            };

            if let Err(e) = codec.send(event.clone()).await {
                warn!("notifier {} write error: {}", addr, e);
                pending = Some(event);
                break;
            }
        }
    }
}

async fn connect(addr: &str) -> TcpStream {
    loop {
        let err = match TcpStream::connect(addr).await {
            Ok(sock) => return sock,
            Err(e)   => e,
        };

        warn!("notifier {} connection error: {}", addr, err);

        sleep(Duration::from_secs(1)).await;
    }
}
