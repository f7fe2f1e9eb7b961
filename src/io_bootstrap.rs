//! Byte-endpoint openers for `--stdio`, `--file`, and `--tcp-l`. Thin
//! glue code — the interesting behavior lives in [`crate::endpoint`] and
//! [`crate::handle`].

use crate::config::ByteIo;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::net::TcpListener;

/// The reader and writer halves of a byte endpoint, opened once by the
/// supervisor and handed out to whichever direction(s) need them — the
/// streaming bridge splits them across its PUB (reader) and SUB (writer)
/// threads, while the request/reply bridge keeps both in one
/// [`crate::endpoint::FdEndpoint`].
pub struct ByteEndpointHalves {
    pub reader: Option<Box<dyn Read + Send>>,
    pub writer: Option<Box<dyn Write + Send>>,
}

/// Opens the byte endpoint selected by `config::Config::byte_io`.
///
/// `--tcp-l` blocks until one client connects (one connection per adapter
/// lifetime; no reconnection handling).
pub fn open(byte_io: &ByteIo) -> io::Result<ByteEndpointHalves> {
    match byte_io {
        ByteIo::Stdio => Ok(ByteEndpointHalves {
            reader: Some(Box::new(io::stdin())),
            writer: Some(Box::new(io::stdout())),
        }),
        ByteIo::File(path) => {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            let writer_half = file.try_clone()?;
            Ok(ByteEndpointHalves {
                reader: Some(Box::new(file)),
                writer: Some(Box::new(writer_half)),
            })
        }
        ByteIo::TcpListen(port) => {
            let listener = TcpListener::bind(("0.0.0.0", *port))?;
            let (stream, peer) = listener.accept()?;
            tracing::info!(%peer, "accepted TCP connection");
            let writer_half = stream.try_clone()?;
            Ok(ByteEndpointHalves {
                reader: Some(Box::new(stream)),
                writer: Some(Box::new(writer_half)),
            })
        }
    }
}
