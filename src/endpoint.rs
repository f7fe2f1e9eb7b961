//! The byte-oriented half of a [`crate::handle::Handle`]: stdio, a file, or
//! a TCP connection, as opposed to a bus socket (see [`crate::bus`]).

use std::io::{self, Read, Write};

/// Uniform blocking read/write surface a [`crate::handle::Handle`] drives,
/// implemented by both byte file descriptors ([`FdEndpoint`]) and bus
/// sockets ([`crate::bus::BusEndpoint`]).
pub trait Endpoint: Send {
    /// Reads the next chunk of available bytes into `buf`, returning the
    /// number of bytes read. Zero means end-of-stream; retries
    /// transparently on an interrupted-syscall indication.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes all of `buf`, retrying until the whole buffer is emitted or a
    /// fatal error occurs.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// A byte endpoint backed by up to two independent file-like handles: one
/// for reading, one for writing. `--stdio` builds both from distinct
/// standard-stream handles; `--file` and `--tcp-l` split a cloned handle.
/// The two are never assumed to alias.
pub struct FdEndpoint {
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
}

impl FdEndpoint {
    pub fn new(
        reader: Option<Box<dyn Read + Send>>,
        writer: Option<Box<dyn Write + Send>>,
    ) -> Self {
        FdEndpoint { reader, writer }
    }
}

impl Endpoint for FdEndpoint {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reader = self
            .reader
            .as_mut()
            .expect("read() called on a write-only FdEndpoint");
        loop {
            match reader.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .expect("write() called on a read-only FdEndpoint");
        let mut remaining = buf;
        while !remaining.is_empty() {
            match writer.write(remaining) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ));
                }
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        writer.flush()
    }
}
