use std::convert::TryFrom;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Result, anyhow};
use log::{debug, info, trace, warn};
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio::{select, try_join};
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
use tokio_rustls::rustls::ServerName;
use crate::flow::{FlowTable, Key};
use crate::graph::Graph;
use crate::proto::Decoded;
use super::{Config, Correlation, Tls};

/// Terminates redirected TLS connections, re-originates them to the
/// server the client was trying to reach and feeds the cleartext of both
/// directions into the flow table.
pub struct Intercept {
    acceptor:    TlsAcceptor,
    connector:   TlsConnector,
    correlation: Arc<Correlation>,
    flows:       Arc<FlowTable>,
    graph:       Graph,
    wait:        Duration,
}

impl Intercept {
    pub fn new(tls: Tls, cfg: &Config, correlation: Arc<Correlation>, flows: Arc<FlowTable>, graph: Graph) -> Self {
        Self {
            acceptor:    TlsAcceptor::from(tls.server),
            connector:   TlsConnector::from(tls.client),
            correlation: correlation,
            flows:       flows,
            graph:       graph,
            wait:        cfg.wait,
        }
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener, mut stop: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            info!("intercepting on {}", addr);
        }

        loop {
            let (sock, peer) = select! {
                accept = listener.accept() => match accept {
                    Ok(accepted) => accepted,
                    Err(e)       => {
                        warn!("accept error: {}", e);
                        sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
                _ = stop.changed() => break,
            };

            let this     = self.clone();
            let mut stop = stop.clone();

            tokio::spawn(async move {
                select! {
                    result = this.intercept(sock, peer) => match result {
                        Ok(()) => trace!("{} finished", peer),
                        Err(e) => debug!("{} failed: {}", peer, e),
                    },
                    _ = stop.changed() => trace!("{} stopped", peer),
                }
            });
        }

        debug!("intercept stopped");
    }

    async fn intercept(&self, sock: TcpStream, peer: SocketAddr) -> Result<()> {
        let target = match self.correlation.lookup(peer, self.wait).await {
            Some(target) => target,
            None         => return Err(anyhow!("no handshake seen from {}", peer)),
        };

        debug!("{} -> {} ({})", peer, target.server, target.key);

        let inbound = timeout(self.wait, self.acceptor.accept(sock)).await??;

        let name = match inbound.get_ref().1.server_name() {
            Some(sni) => ServerName::try_from(sni).map_err(|_| anyhow!("invalid SNI {}", sni))?,
            None      => ServerName::IpAddress(target.server.ip()),
        };

        let upstream = timeout(self.wait, TcpStream::connect(target.server)).await??;
        let outbound = timeout(self.wait, self.connector.connect(name, upstream)).await??;

        self.relay(inbound, outbound, target.key).await
    }

    async fn relay(
        &self,
        inbound:  server::TlsStream<TcpStream>,
        outbound: client::TlsStream<TcpStream>,
        key:      Key,
    ) -> Result<()> {
        let (ir, iw) = split(inbound);
        let (or, ow) = split(outbound);

        try_join!(
            self.pump(ir, ow, key),
            self.pump(or, iw, key.reverse())
        )?;

        Ok(())
    }

    async fn pump<R, W>(&self, mut r: R, mut w: W, key: Key) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; 16 * 1024];

        loop {
            let n = match r.read(&mut buf).await {
                Ok(0)                                          => break,
                Ok(n)                                          => n,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e)                                         => return Err(e.into()),
            };

            let chunk = &buf[..n];

            if let Some(Decoded::Request(req)) = self.flows.cleartext(key, chunk) {
                self.graph.http(&req);
            }

            w.write_all(chunk).await?;
            w.flush().await?;
        }

        if let Err(e) = w.shutdown().await {
            trace!("{}: shutdown error: {}", key, e);
        }

        Ok(())
    }
}
