//! The request/reply bridge: couples a requester Handle and a responder
//! Handle with a reply-pending state machine.
//!
//! Each side's blocking `read` is pumped by a dedicated thread that
//! forwards `(SideName, io::Result<Vec<u8>>)` onto a channel shared by both
//! threads; the main loop does `recv_timeout` when the responder is a bus
//! socket (the only case with a meaningful reply deadline) or `recv`
//! otherwise. A side's I/O is kept behind a `Mutex` so its reader thread
//! and the main loop's writes never touch the underlying socket or file
//! descriptor at the same time.

use crate::bus::{BusEndpoint, BusError};
use crate::endpoint::Endpoint;
use crate::filter::Filter;
use crate::framer::Framer;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const READ_BUF_SIZE: usize = 64 * 1024;

/// The concrete I/O underneath one side of the bridge.
pub enum SideIo {
    Bus(BusEndpoint),
    Byte(Box<dyn Endpoint>),
}

impl SideIo {
    fn is_bus(&self) -> bool {
        matches!(self, SideIo::Bus(_))
    }

    fn restart(&mut self) -> Result<(), BusError> {
        match self {
            SideIo::Bus(bus) => bus.restart(),
            SideIo::Byte(_) => Ok(()),
        }
    }
}

impl Endpoint for SideIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SideIo::Bus(bus) => bus.read(buf),
            SideIo::Byte(endpoint) => endpoint.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            SideIo::Bus(bus) => bus.write(buf),
            SideIo::Byte(endpoint) => endpoint.write(buf),
        }
    }
}

/// One side of the bridge: its I/O plus the framer/filter applied when
/// frames are written into it. The bus-side handle carries the configured
/// framer and the ingress filter (byte stream → bus); the byte-side handle
/// carries the identity framer and the egress filter (bus → byte stream).
pub struct ReqRepSide {
    io: Arc<Mutex<SideIo>>,
    framer: Box<dyn Framer>,
    filter: Box<dyn Filter>,
}

impl ReqRepSide {
    pub fn new(io: SideIo, framer: Box<dyn Framer>, filter: Box<dyn Filter>) -> Self {
        ReqRepSide {
            io: Arc::new(Mutex::new(io)),
            framer,
            filter,
        }
    }

    fn is_bus(&self) -> bool {
        self.io.lock().unwrap().is_bus()
    }

    fn restart(&mut self) -> Result<(), BusError> {
        self.io.lock().unwrap().restart()
    }

    fn drain_one(&mut self, input: &[u8]) -> io::Result<usize> {
        let mut io = self.io.lock().unwrap();
        crate::handle::drain_one(&mut *self.framer, &*self.filter, &mut *io, input)
    }

    fn spawn_reader(
        &self,
        name: SideName,
        tx: mpsc::Sender<(SideName, io::Result<Vec<u8>>)>,
    ) -> thread::JoinHandle<()> {
        let io = self.io.clone();
        thread::spawn(move || loop {
            let mut buf = vec![0u8; READ_BUF_SIZE];
            let result = {
                let mut guard = io.lock().unwrap();
                guard.read(&mut buf)
            };
            let done = result.is_err();
            let event = match result {
                Ok(n) => Ok(buf[..n].to_vec()),
                Err(e) => Err(e),
            };
            let is_eof = matches!(&event, Ok(bytes) if bytes.is_empty());
            if tx.send((name, event)).is_err() {
                return;
            }
            if done || is_eof {
                return;
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideName {
    Requester,
    Responder,
}

fn bus_err_to_io(e: BusError) -> io::Error {
    io::Error::other(e)
}

/// Runs the request/reply bridge until either side reaches end-of-stream
/// or a fatal I/O error occurs.
pub fn run(
    mut requester: ReqRepSide,
    mut responder: ReqRepSide,
    rep_timeout: Duration,
) -> io::Result<()> {
    let (tx, rx) = mpsc::channel();
    let _req_reader = requester.spawn_reader(SideName::Requester, tx.clone());
    let _resp_reader = responder.spawn_reader(SideName::Responder, tx.clone());
    drop(tx);

    let responder_is_bus = responder.is_bus();
    let requester_is_bus = requester.is_bus();
    let mut reply_pending = false;

    loop {
        let event = if responder_is_bus {
            match rx.recv_timeout(rep_timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        } else {
            match rx.recv() {
                Ok(event) => Some(event),
                Err(_) => return Ok(()),
            }
        };

        let (name, result) = match event {
            None => {
                if reply_pending {
                    tracing::warn!("reply timeout exceeded, restarting responder socket");
                    responder.restart().map_err(bus_err_to_io)?;
                    reply_pending = false;
                }
                continue;
            }
            Some(pair) => pair,
        };

        let bytes = match result {
            Ok(bytes) if bytes.is_empty() => {
                tracing::debug!(side = ?name, "request/reply bridge: side reached end-of-stream");
                return Ok(());
            }
            Ok(bytes) => bytes,
            Err(e) => return Err(e),
        };

        match name {
            SideName::Requester => {
                // Requester readable means a reply arrived.
                if !reply_pending {
                    tracing::warn!("reply arrived with no request pending");
                    if responder_is_bus {
                        // Drain and discard: the bytes are simply dropped.
                    } else {
                        let written = responder.drain_one(&bytes)?;
                        if written > 0 {
                            reply_pending = false;
                        }
                    }
                } else {
                    let written = responder.drain_one(&bytes)?;
                    if written > 0 {
                        reply_pending = false;
                    }
                }
            }
            SideName::Responder => {
                // Responder readable means a new request arrived.
                if reply_pending {
                    tracing::warn!("new request arrived before the previous reply was observed");
                    if requester_is_bus {
                        requester.restart().map_err(bus_err_to_io)?;
                    }
                    reply_pending = false;
                }
                let written = requester.drain_one(&bytes)?;
                if written > 0 {
                    reply_pending = true;
                }
            }
        }
    }
}
