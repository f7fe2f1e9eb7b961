pub mod bridge;
pub mod bus;
pub mod config;
pub mod endpoint;
pub mod filter;
pub mod framer;
pub mod handle;
pub mod io_bootstrap;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub use config::{ByteIo, Config, ConfigError};
pub use filter::{Filter, FilterKind};
pub use framer::{Framer, FramerKind};
pub use handle::Handle;

/// Error returned by most functions in this crate that cross an I/O or
/// configuration boundary.
///
/// Protocol-internal conditions (malformed frame bytes, a rejected filter
/// rule) are never surfaced this way — they are absorbed by the framer and
/// filter layers. This type only carries conditions that end a bridge
/// direction or abort startup.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;
