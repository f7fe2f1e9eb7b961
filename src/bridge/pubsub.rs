//! The streaming bridge: a simple pump, no timeouts, no retries, no
//! backpressure signalling.

use crate::handle::Handle;
use std::io;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Reads up to 64 KiB from `source`, drains it through `destination`'s
/// framer/filter, repeats. Terminates on end-of-stream (`read` returns 0)
/// or the first fatal I/O error from either side.
pub fn run(source: &mut Handle, destination: &mut Handle) -> io::Result<()> {
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            tracing::debug!("streaming bridge: source reached end-of-stream");
            return Ok(());
        }
        destination.drain_all(&buf[..n])?;
    }
}
