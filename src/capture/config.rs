use std::path::PathBuf;
use std::time::Duration;
use super::Filter;

#[derive(Debug)]
pub struct Config {
    pub input:       Input,
    pub filter:      Filter,
    pub timeout:     Duration,
    pub interval:    Duration,
    pub buffer_size: u64,
    pub snaplen:     u64,
    pub promisc:     bool,
    pub dump:        Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub enum Input {
    Device(String),
    File(PathBuf),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input:       Input::Device("any".to_owned()),
            filter:      Filter::default(),
            timeout:     Duration::from_millis(500),
            interval:    Duration::from_secs(5),
            buffer_size: 10_000_000,
            snaplen:     65_535,
            promisc:     true,
            dump:        None,
        }
    }
}
