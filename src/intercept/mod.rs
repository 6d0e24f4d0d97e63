use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub use correlate::{Correlation, Target};
pub use proxy::Intercept;
pub use tls::Tls;

#[derive(Clone, Debug)]
pub struct Config {
    pub listen: SocketAddr,
    pub cert:   PathBuf,
    pub key:    PathBuf,
    pub verify: bool,
    pub roots:  Option<PathBuf>,
    pub wait:   Duration,
}

impl Config {
    pub fn new(listen: SocketAddr, cert: PathBuf, key: PathBuf) -> Self {
        Self {
            listen: listen,
            cert:   cert,
            key:    key,
            verify: false,
            roots:  None,
            wait:   Duration::from_secs(5),
        }
    }
}

mod correlate;
mod proxy;
mod tls;
