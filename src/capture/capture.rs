use std::convert::TryInto;
use anyhow::{Result, anyhow};
use log::{debug, info};
use pcap::{Activated, Capture, Linktype};
use super::{Config, Input, Link};

pub fn capture(cfg: &Config) -> Result<(Capture<dyn Activated>, Link)> {
    let mut cap: Capture<dyn Activated> = match &cfg.input {
        Input::Device(dev) => device(dev, cfg)?.into(),
        Input::File(path)  => Capture::from_file(path)?.into(),
    };

    let link = match Link::from_linktype(cap.get_datalink()) {
        Some(link) => link,
        None       => return Err(anyhow!("unsupported link type {:?}", cap.get_datalink())),
    };

    let filter = cfg.filter.expression();
    debug!("capture filter: {}", filter);
    cap.filter(&filter)?;

    info!("capturing from {:?} ({:?})", cfg.input, link);

    Ok((cap, link))
}

fn device(dev: &str, cfg: &Config) -> Result<Capture<pcap::Active>> {
    let mut cap = Capture::from_device(dev)?
        .buffer_size(cfg.buffer_size as i32)
        .timeout(cfg.timeout.as_millis().try_into()?)
        .snaplen(cfg.snaplen as i32)
        .promisc(cfg.promisc)
        .open()?;

    if let Some(linktype) = cap.list_datalinks()?.into_iter().find(|lt| lt.0 == 1) {
        cap.set_datalink(linktype)?;
    }

    Ok(cap)
}

impl Link {
    pub fn from_linktype(lt: Linktype) -> Option<Self> {
        match lt.0 {
            1        => Some(Link::Ethernet),
            12 | 101 => Some(Link::Raw),
            113      => Some(Link::Cooked),
            _        => None,
        }
    }
}
