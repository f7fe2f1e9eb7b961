//! Uniform read/write façade over an [`Endpoint`], bundling a [`Framer`]
//! and [`Filter`].

use crate::endpoint::Endpoint;
use crate::filter::Filter;
use crate::framer::Framer;
use std::io;

/// A Handle unites an endpoint (bus socket or byte file descriptors) with
/// the framer/filter state applied to bytes flowing through it.
pub struct Handle {
    endpoint: Box<dyn Endpoint>,
    framer: Box<dyn Framer>,
    filter: Box<dyn Filter>,
}

impl Handle {
    pub fn new(endpoint: Box<dyn Endpoint>, framer: Box<dyn Framer>, filter: Box<dyn Filter>) -> Self {
        Handle {
            endpoint,
            framer,
            filter,
        }
    }

    /// Reads the next chunk of bytes from the underlying endpoint. Zero
    /// means end-of-stream.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.endpoint.read(buf)
    }

    /// See [`drain_one`]. Drains through this Handle's own framer, filter
    /// and endpoint.
    pub fn drain_one(&mut self, input: &[u8]) -> io::Result<usize> {
        drain_one(&mut *self.framer, &*self.filter, &mut *self.endpoint, input)
    }

    /// See [`drain_all`]. Drains through this Handle's own framer, filter
    /// and endpoint.
    pub fn drain_all(&mut self, input: &[u8]) -> io::Result<usize> {
        drain_all(&mut *self.framer, &*self.filter, &mut *self.endpoint, input)
    }
}

/// Feeds `input` to `framer`, and for each frame produced forwards it
/// through `filter`; only admitted frames are written to `endpoint`.
/// Drain-one stops as soon as one admitted frame has been written, but —
/// the subtlety ported faithfully from the original C implementation — a
/// filtered-out frame does *not* end the call: the framer keeps being
/// re-invoked (against whatever of `input` remains, then against its own
/// internal accumulator) until either no more frames can be produced or an
/// admitted frame is written.
///
/// Returns the number of admitted frames written (0 or 1). Free-standing so
/// the request/reply bridge, which needs to distinguish a bus endpoint from
/// a byte endpoint for restart purposes, can apply the same draining logic
/// without going through a [`Handle`].
pub fn drain_one(
    framer: &mut dyn Framer,
    filter: &dyn Filter,
    endpoint: &mut dyn Endpoint,
    input: &[u8],
) -> io::Result<usize> {
    let mut remaining = input;
    loop {
        let (consumed, frame) = framer.process(remaining);
        remaining = &remaining[consumed..];

        match frame {
            None => return Ok(0),
            Some(frame) => {
                if filter.admit(&frame) {
                    endpoint.write(&frame)?;
                    return Ok(1);
                }
                continue;
            }
        }
    }
}

/// Repeatedly pulls frames out of `input` (and whatever `framer` has
/// buffered internally) until none remain, forwarding every admitted one to
/// `endpoint`. Returns the total number of admitted frames written.
pub fn drain_all(
    framer: &mut dyn Framer,
    filter: &dyn Filter,
    endpoint: &mut dyn Endpoint,
    input: &[u8],
) -> io::Result<usize> {
    let mut remaining = input;
    let mut total = 0;
    loop {
        let (consumed, frame) = framer.process(remaining);
        remaining = &remaining[consumed..];

        match frame {
            None => return Ok(total),
            Some(frame) => {
                if filter.admit(&frame) {
                    endpoint.write(&frame)?;
                    total += 1;
                }
                continue;
            }
        }
    }
}
