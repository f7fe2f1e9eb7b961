//! Command-line parsing (`argh`) and validation into an immutable
//! [`Config`].

use crate::bus::SocketKind;
use crate::filter::FilterKind;
use crate::framer::FramerKind;
use argh::FromArgs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("exactly one byte-endpoint mode must be selected (--stdio, --file, --tcp-l)")]
    NoByteEndpoint,

    #[error("more than one byte-endpoint mode selected (--stdio, --file, --tcp-l are exclusive)")]
    MultipleByteEndpoints,

    #[error("exactly one bus mode must be selected (--pub/--sub, --req, --rep)")]
    NoBusMode,

    #[error("--req and --rep are exclusive, and exclusive with --pub/--sub")]
    ConflictingBusModes,

    #[error("{flag} given a filter kind but no config path, or a config path but no filter kind")]
    FilterConfigMismatch { flag: &'static str },

    #[error("invalid framer name: {0}")]
    Framer(#[from] crate::framer::FramerError),

    #[error("invalid filter name: {0}")]
    Filter(#[from] crate::filter::FilterError),
}

/// Raw, unvalidated command-line arguments.
#[derive(FromArgs, Debug)]
#[argh(description = "bridge a messaging bus to a byte-oriented transport")]
pub struct RawArgs {
    /// PUB bus address; combinable with --sub
    #[argh(option, short = 'p')]
    pub pub_addr: Option<String>,

    /// SUB bus address; combinable with --pub
    #[argh(option, short = 's')]
    pub sub_addr: Option<String>,

    /// REQ bus address; exclusive
    #[argh(option, short = 'r')]
    pub req_addr: Option<String>,

    /// REP bus address; exclusive
    #[argh(option, short = 'y')]
    pub rep_addr: Option<String>,

    /// framer on the ingress direction: sbp|rtcm3
    #[argh(option, short = 'f')]
    pub framer: Option<String>,

    /// ingress filter: sbp
    #[argh(option)]
    pub filter_in: Option<String>,

    /// egress filter: sbp
    #[argh(option)]
    pub filter_out: Option<String>,

    /// ingress filter rule table
    #[argh(option)]
    pub filter_in_config: Option<PathBuf>,

    /// egress filter rule table
    #[argh(option)]
    pub filter_out_config: Option<PathBuf>,

    /// byte endpoint = standard streams
    #[argh(switch)]
    pub stdio: bool,

    /// byte endpoint = regular file (read+write)
    #[argh(option)]
    pub file: Option<PathBuf>,

    /// byte endpoint = TCP listener
    #[argh(option)]
    pub tcp_l: Option<u16>,

    /// REQ/REP reply timeout in ms (default 10000)
    #[argh(option, default = "10_000")]
    pub rep_timeout: u64,

    /// delay after opening a bus socket, in ms (default 0)
    #[argh(option, default = "0")]
    pub startup_delay: u64,

    /// emit diagnostic trace on stderr
    #[argh(switch)]
    pub debug: bool,
}

/// The byte-oriented half of the bridge, already resolved to a concrete
/// opener selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteIo {
    Stdio,
    File(PathBuf),
    TcpListen(u16),
}

/// One configured bus direction: a socket kind paired with its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusDirection {
    pub kind: SocketKind,
    pub addr: String,
}

/// The bus mode selected on the command line, already validated to be
/// exactly one of these shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMode {
    PubSub {
        pub_dir: Option<BusDirection>,
        sub_dir: Option<BusDirection>,
    },
    Req(BusDirection),
    Rep(BusDirection),
}

/// Immutable, validated configuration, passed by reference into the
/// supervisor and bridge code instead of as process-wide mutable globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub byte_io: ByteIo,
    pub bus_mode: BusMode,
    pub framer: FramerKind,
    pub filter_in: FilterKind,
    pub filter_in_config: Option<PathBuf>,
    pub filter_out: FilterKind,
    pub filter_out_config: Option<PathBuf>,
    pub rep_timeout_ms: u64,
    pub startup_delay_ms: u64,
    pub debug: bool,
}

impl Config {
    pub fn from_args() -> Result<Self, ConfigError> {
        let raw: RawArgs = argh::from_env();
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawArgs) -> Result<Self, ConfigError> {
        let byte_io = {
            let count = raw.stdio as u8 + raw.file.is_some() as u8 + raw.tcp_l.is_some() as u8;
            if count == 0 {
                return Err(ConfigError::NoByteEndpoint);
            }
            if count > 1 {
                return Err(ConfigError::MultipleByteEndpoints);
            }
            if raw.stdio {
                ByteIo::Stdio
            } else if let Some(path) = raw.file {
                ByteIo::File(path)
            } else {
                ByteIo::TcpListen(raw.tcp_l.unwrap())
            }
        };

        let pubsub_selected = raw.pub_addr.is_some() || raw.sub_addr.is_some();
        let bus_mode_count =
            pubsub_selected as u8 + raw.req_addr.is_some() as u8 + raw.rep_addr.is_some() as u8;
        if bus_mode_count == 0 {
            return Err(ConfigError::NoBusMode);
        }
        if bus_mode_count > 1 {
            return Err(ConfigError::ConflictingBusModes);
        }

        let bus_mode = if let Some(addr) = raw.req_addr {
            BusMode::Req(BusDirection {
                kind: SocketKind::Req,
                addr,
            })
        } else if let Some(addr) = raw.rep_addr {
            BusMode::Rep(BusDirection {
                kind: SocketKind::Rep,
                addr,
            })
        } else {
            BusMode::PubSub {
                pub_dir: raw.pub_addr.map(|addr| BusDirection {
                    kind: SocketKind::Pub,
                    addr,
                }),
                sub_dir: raw.sub_addr.map(|addr| BusDirection {
                    kind: SocketKind::Sub,
                    addr,
                }),
            }
        };

        let framer = raw
            .framer
            .map(|s| s.parse::<FramerKind>())
            .transpose()?
            .unwrap_or_default();

        let filter_in = Self::resolve_filter(raw.filter_in, &raw.filter_in_config, "--filter-in")?;
        let filter_out =
            Self::resolve_filter(raw.filter_out, &raw.filter_out_config, "--filter-out")?;

        Ok(Config {
            byte_io,
            bus_mode,
            framer,
            filter_in,
            filter_in_config: raw.filter_in_config,
            filter_out,
            filter_out_config: raw.filter_out_config,
            rep_timeout_ms: raw.rep_timeout,
            startup_delay_ms: raw.startup_delay,
            debug: raw.debug,
        })
    }

    fn resolve_filter(
        kind: Option<String>,
        config_path: &Option<PathBuf>,
        flag: &'static str,
    ) -> Result<FilterKind, ConfigError> {
        match (kind, config_path) {
            (None, None) => Ok(FilterKind::None),
            (Some(kind), Some(_)) => Ok(kind.parse::<FilterKind>()?),
            _ => Err(ConfigError::FilterConfigMismatch { flag }),
        }
    }
}
