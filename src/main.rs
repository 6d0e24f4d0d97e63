use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use anyhow::Result;
use clap::{App, ArgMatches, load_yaml, value_t};
use crossbeam_channel::RecvTimeoutError;
use env_logger::Builder;
use jemallocator::Jemalloc;
use log::{debug, info, warn};
use log::LevelFilter::*;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag::register;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use flowtap::{capture, intercept, Config, Session};
use flowtap::args::{many, opt};
use flowtap::capture::{Filter, Input, Timer, Timestamp};
use flowtap::flow::Limits;
use flowtap::notify::{Event, Notifier};

#[global_allocator]
static ALLOC: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    let yaml = load_yaml!("args.yml");
    let ver  = env!("CARGO_PKG_VERSION");
    let args = App::from_yaml(&yaml).version(ver).get_matches();

    let (module, level) = match args.occurrences_of("verbose") {
        0 => (Some(module_path!()), Info),
        1 => (Some(module_path!()), Debug),
        2 => (Some(module_path!()), Trace),
        _ => (None,                 Trace),
    };
    Builder::from_default_env().filter(module, level).init();

    info!("initializing flowtap {}", ver);

    let cfg      = config(&args)?;
    let interval = cfg.capture.interval;

    let shutdown = Arc::new(AtomicBool::new(false));
    register(SIGTERM, shutdown.clone())?;
    register(SIGINT,  shutdown.clone())?;

    let rt     = Runtime::new()?;
    let notify = args.value_of("notify").map(|addr| {
        Notifier::new(addr.to_owned(), rt.handle())
    });

    let mut session = Session::start(cfg)?;
    let events      = session.events();
    let mut status  = Timer::new(interval);

    let stdout = io::stdout();
    let mut output = Output {
        notify: notify.as_ref(),
        stdout: stdout.lock(),
    };

    let wait = Duration::from_millis(100);

    while !shutdown.load(Ordering::Acquire) {
        match events.recv_timeout(wait) {
            Ok(event)                           => output.emit(event)?,
            Err(RecvTimeoutError::Timeout)      => {
                if !session.status().running {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if status.ready(Timestamp::now()) {
            debug!("status {}", serde_json::to_string(&session.status())?);
        }
    }

    info!("shutting down");

    session.stop();

    for event in events.try_iter() {
        output.emit(event)?;
    }

    drop(output);

    if let Some(notify) = notify {
        if rt.block_on(timeout_finish(notify)).is_err() {
            warn!("notifier did not finish");
        }
    }

    Ok(())
}

struct Output<'a, W: Write> {
    notify: Option<&'a Notifier>,
    stdout: W,
}

impl<W: Write> Output<'_, W> {
    fn emit(&mut self, event: Event) -> Result<()> {
        match self.notify {
            Some(notify) => {
                if let Err(e) = notify.send(event) {
                    warn!("notifier queue: {}", e);
                }
            }
            None => {
                serde_json::to_writer(&mut self.stdout, &event)?;
                writeln!(self.stdout)?;
            }
        }
        Ok(())
    }
}

async fn timeout_finish(notify: Notifier) -> Result<(), tokio::time::error::Elapsed> {
    timeout(Duration::from_secs(5), notify.finish()).await
}

fn config(args: &ArgMatches) -> Result<Config> {
    let input = match args.value_of("read") {
        Some(path) => Input::File(PathBuf::from(path)),
        None       => Input::Device(value_t!(args, "device", String)?),
    };

    let filter = Filter {
        include: many(args.values_of("filter"))?,
        exclude: many(args.values_of("exclude"))?,
        local:   args.is_present("exclude-local"),
    };

    let capture = capture::Config {
        input:    input,
        filter:   filter,
        interval: Duration::from_secs(value_t!(args, "interval", u64)?),
        snaplen:  value_t!(args, "snaplen", u64)?,
        dump:     args.value_of("write").map(PathBuf::from),
        ..capture::Config::default()
    };

    let limits = Limits {
        max_buffered: value_t!(args, "max-buffered", usize)?,
        max_payload:  value_t!(args, "max-payload", usize)?,
        dedup:        !args.is_present("no-dedup"),
        finalize:     !args.is_present("no-finalize"),
    };

    let intercept = match opt::<SocketAddr>(args.value_of("intercept"))? {
        Some(listen) => {
            let cert = value_t!(args, "cert", PathBuf)?;
            let key  = value_t!(args, "key", PathBuf)?;
            let mut cfg = intercept::Config::new(listen, cert, key);
            cfg.verify = args.is_present("verify");
            cfg.roots  = args.value_of("roots").map(PathBuf::from);
            cfg.wait   = Duration::from_secs(value_t!(args, "wait", u64)?);
            Some(cfg)
        }
        None => None,
    };

    Ok(Config {
        capture:   capture,
        intercept: intercept,
        limits:    limits,
        tls_ports: many(args.values_of("tls-port"))?.into_iter().collect(),
        resolve:   args.is_present("resolve"),
        tags:      many(args.values_of("tag"))?,
        ..Config::default()
    })
}
