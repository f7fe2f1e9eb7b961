//! Bus sockets: real ZeroMQ bindings via the `zmq` crate.

use crate::endpoint::Endpoint;
use std::io;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to create {kind:?} socket: {source}")]
    Create {
        kind: SocketKind,
        #[source]
        source: zmq::Error,
    },

    #[error("failed to {action} {kind:?} socket at {addr:?}: {source}")]
    Attach {
        kind: SocketKind,
        addr: String,
        action: &'static str,
        #[source]
        source: zmq::Error,
    },

    #[error("failed to set socket option on {kind:?} socket: {source}")]
    Option {
        kind: SocketKind,
        #[source]
        source: zmq::Error,
    },

    #[error("{kind:?} socket restart exhausted its retry budget: {source}")]
    RestartExhausted {
        kind: SocketKind,
        #[source]
        source: zmq::Error,
    },
}

/// The four bus socket kinds the adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Pub,
    Sub,
    Req,
    Rep,
}

impl SocketKind {
    fn zmq_type(self) -> zmq::SocketType {
        match self {
            SocketKind::Pub => zmq::PUB,
            SocketKind::Sub => zmq::SUB,
            SocketKind::Req => zmq::REQ,
            SocketKind::Rep => zmq::REP,
        }
    }

    /// PUB/REP bind (server side); SUB/REQ connect (client side) unless the
    /// address's leading `>` overrides this — see [`parse_addr`].
    fn binds_by_default(self) -> bool {
        matches!(self, SocketKind::Pub | SocketKind::Rep)
    }
}

const RESTART_ATTEMPTS: u32 = 3;
const RESTART_DELAY: Duration = Duration::from_millis(1);

/// `>`-prefixed addresses mean connect; anything else binds.
/// Returns `(connect, bare_addr)`.
fn parse_addr(addr: &str) -> (bool, &str) {
    match addr.strip_prefix('>') {
        Some(rest) => (true, rest),
        None => (false, addr),
    }
}

/// A bus endpoint: a `zmq::Socket` plus enough state (kind, address) to
/// destroy and recreate itself on `restart()`.
pub struct BusEndpoint {
    ctx: zmq::Context,
    socket: Option<zmq::Socket>,
    kind: SocketKind,
    addr: String,
    startup_delay: Duration,
}

impl BusEndpoint {
    pub fn open(kind: SocketKind, addr: String, startup_delay: Duration) -> Result<Self, BusError> {
        let ctx = zmq::Context::new();
        let socket = Self::create_and_attach(&ctx, kind, &addr)?;
        thread::sleep(startup_delay);
        Ok(BusEndpoint {
            ctx,
            socket: Some(socket),
            kind,
            addr,
            startup_delay,
        })
    }

    /// The live socket. `None` only transiently inside `restart()`, which
    /// never overlaps with `read`/`write` on the same endpoint.
    fn socket(&mut self) -> &mut zmq::Socket {
        self.socket
            .as_mut()
            .expect("BusEndpoint::socket called while no socket is attached")
    }

    fn create_and_attach(
        ctx: &zmq::Context,
        kind: SocketKind,
        addr: &str,
    ) -> Result<zmq::Socket, BusError> {
        let socket = ctx
            .socket(kind.zmq_type())
            .map_err(|source| BusError::Create { kind, source })?;

        Self::apply_options(&socket, kind)?;

        let (connect, bare_addr) = parse_addr(addr);
        if connect {
            socket
                .connect(bare_addr)
                .map_err(|source| BusError::Attach {
                    kind,
                    addr: addr.to_owned(),
                    action: "connect",
                    source,
                })?;
        } else {
            socket.bind(bare_addr).map_err(|source| BusError::Attach {
                kind,
                addr: addr.to_owned(),
                action: "bind",
                source,
            })?;
        }

        Ok(socket)
    }

    fn apply_options(socket: &zmq::Socket, kind: SocketKind) -> Result<(), BusError> {
        match kind {
            SocketKind::Sub => socket
                .set_subscribe(b"")
                .map_err(|source| BusError::Option { kind, source }),
            SocketKind::Req => {
                socket
                    .set_req_relaxed(true)
                    .map_err(|source| BusError::Option { kind, source })?;
                socket
                    .set_req_correlate(true)
                    .map_err(|source| BusError::Option { kind, source })
            }
            SocketKind::Pub | SocketKind::Rep => Ok(()),
        }
    }

    /// Destroys and recreates the underlying socket, retrying up to 3
    /// times with a 1ms delay between attempts.
    pub fn restart(&mut self) -> Result<(), BusError> {
        // Drop the old socket first: a PUB/REP socket still bound to its
        // address would otherwise make every `create_and_attach` retry
        // fail with the address already in use.
        self.socket = None;

        let mut last_err = None;
        for attempt in 0..RESTART_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(RESTART_DELAY);
            }
            match Self::create_and_attach(&self.ctx, self.kind, &self.addr) {
                Ok(socket) => {
                    self.socket = Some(socket);
                    thread::sleep(self.startup_delay);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(BusError::RestartExhausted {
            kind: self.kind,
            source: match last_err {
                Some(BusError::Attach { source, .. }) | Some(BusError::Create { source, .. }) => {
                    source
                }
                _ => zmq::Error::EAGAIN,
            },
        })
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }
}

impl Endpoint for BusEndpoint {
    /// A chunk is the concatenation of all frames in one message
    /// (multipart), truncated to `buf`'s capacity if it doesn't fit.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let msg = match self.socket().recv_multipart(0) {
                Ok(parts) => parts,
                Err(zmq::Error::EINTR) => continue,
                Err(e) => return Err(to_io_error(e)),
            };

            let mut total = 0usize;
            for part in msg {
                let remaining = buf.len() - total;
                if remaining == 0 {
                    break;
                }
                let take = part.len().min(remaining);
                buf[total..total + take].copy_from_slice(&part[..take]);
                total += take;
            }
            return Ok(total);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        loop {
            match self.socket().send(buf, 0) {
                Ok(()) => return Ok(()),
                Err(zmq::Error::EINTR) => continue,
                Err(e) => return Err(to_io_error(e)),
            }
        }
    }
}

fn to_io_error(e: zmq::Error) -> io::Error {
    io::Error::other(e)
}
