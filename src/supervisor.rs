//! Parses configuration (done by the caller), installs signal handling,
//! spawns one thread per active traffic direction, and joins them,
//! realized with threads instead of forked children.

use crate::bridge::reqrep::{ReqRepSide, SideIo};
use crate::bridge::{pubsub, reqrep};
use crate::bus::BusEndpoint;
use crate::config::{BusMode, Config};
use crate::endpoint::FdEndpoint;
use crate::filter::FilterKind;
use crate::framer::FramerKind;
use crate::handle::Handle;
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::io;
use std::thread;
use std::time::Duration;

/// Installs the process-wide signal policy: `SIGPIPE` ignored so a write to
/// a closed peer returns `EPIPE` instead of terminating the process, and a
/// dedicated thread that exits the whole process on `SIGINT`/`SIGTERM`/
/// `SIGQUIT` (mirroring the original's `killpg` + `_exit`: no cooperative
/// shutdown, the process image is torn down directly).
pub fn install_signal_handlers() -> io::Result<()> {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT])?;
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            tracing::info!(signal, "received termination signal, exiting");
            std::process::exit(0);
        }
    });

    Ok(())
}

/// Builds the configured directions and runs them to completion, joining
/// every spawned thread. Returns the first fatal error observed, if any.
pub fn run(config: &Config) -> io::Result<()> {
    match &config.bus_mode {
        BusMode::PubSub { pub_dir, sub_dir } => run_pubsub(config, pub_dir.as_ref(), sub_dir.as_ref()),
        BusMode::Req(dir) => {
            let startup_delay = Duration::from_millis(config.startup_delay_ms);
            let bus = BusEndpoint::open(dir.kind, dir.addr.clone(), startup_delay)
                .map_err(io::Error::other)?;
            run_reqrep(config, SideIo::Bus(bus), true)
        }
        BusMode::Rep(dir) => {
            let startup_delay = Duration::from_millis(config.startup_delay_ms);
            let bus = BusEndpoint::open(dir.kind, dir.addr.clone(), startup_delay)
                .map_err(io::Error::other)?;
            run_reqrep(config, SideIo::Bus(bus), false)
        }
    }
}

fn run_pubsub(
    config: &Config,
    pub_dir: Option<&crate::config::BusDirection>,
    sub_dir: Option<&crate::config::BusDirection>,
) -> io::Result<()> {
    let halves = crate::io_bootstrap::open(&config.byte_io)?;
    let startup_delay = Duration::from_millis(config.startup_delay_ms);

    let mut handles = Vec::new();

    if let Some(dir) = pub_dir {
        let reader = halves
            .reader
            .expect("byte endpoint must provide a reader for PUB direction");
        let mut source = Handle::new(
            Box::new(FdEndpoint::new(Some(reader), None)),
            FramerKind::None.build(),
            FilterKind::None.build(None).unwrap(),
        );
        let bus = BusEndpoint::open(dir.kind, dir.addr.clone(), startup_delay)
            .map_err(io::Error::other)?;
        let filter = config
            .filter_in
            .build(config.filter_in_config.as_deref())
            .map_err(io::Error::other)?;
        let mut destination = Handle::new(Box::new(bus), config.framer.build(), filter);
        handles.push(thread::spawn(move || -> io::Result<()> {
            pubsub::run(&mut source, &mut destination)
        }));
    } else {
        // Reader half unused in this mode; drop it explicitly so file/TCP
        // handles close promptly if only SUB is active.
        drop(halves.reader);
    }

    if let Some(dir) = sub_dir {
        let writer = halves
            .writer
            .expect("byte endpoint must provide a writer for SUB direction");
        let bus = BusEndpoint::open(dir.kind, dir.addr.clone(), startup_delay)
            .map_err(io::Error::other)?;
        let mut source = Handle::new(
            Box::new(bus),
            FramerKind::None.build(),
            FilterKind::None.build(None).unwrap(),
        );
        let filter = config
            .filter_out
            .build(config.filter_out_config.as_deref())
            .map_err(io::Error::other)?;
        let mut destination = Handle::new(
            Box::new(FdEndpoint::new(None, Some(writer))),
            FramerKind::None.build(),
            filter,
        );
        handles.push(thread::spawn(move || -> io::Result<()> {
            pubsub::run(&mut source, &mut destination)
        }));
    }

    join_all(handles)
}

fn run_reqrep(config: &Config, bus_side: SideIo, bus_is_requester: bool) -> io::Result<()> {
    let halves = crate::io_bootstrap::open(&config.byte_io)?;
    let byte_endpoint = FdEndpoint::new(halves.reader, halves.writer);
    let byte_side = SideIo::Byte(Box::new(byte_endpoint));

    let bus_filter = config
        .filter_in
        .build(config.filter_in_config.as_deref())
        .map_err(io::Error::other)?;
    let byte_filter = config
        .filter_out
        .build(config.filter_out_config.as_deref())
        .map_err(io::Error::other)?;

    let bus_reqrep_side = ReqRepSide::new(bus_side, config.framer.build(), bus_filter);
    let byte_reqrep_side = ReqRepSide::new(byte_side, FramerKind::None.build(), byte_filter);

    let (requester, responder) = if bus_is_requester {
        (bus_reqrep_side, byte_reqrep_side)
    } else {
        (byte_reqrep_side, bus_reqrep_side)
    };

    let timeout = Duration::from_millis(config.rep_timeout_ms);
    let handle = thread::spawn(move || -> io::Result<()> { reqrep::run(requester, responder, timeout) });
    join_all(vec![handle])
}

fn join_all(handles: Vec<thread::JoinHandle<io::Result<()>>>) -> io::Result<()> {
    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "bridge direction terminated with an error");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(_) => {
                tracing::error!("bridge direction thread panicked");
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
