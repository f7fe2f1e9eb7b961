//! `zmq_adapter` — bridges a ZeroMQ bus to a byte-oriented transport.

use zmq_adapter::config::Config;
use zmq_adapter::supervisor;

mod logging;

fn main() -> std::process::ExitCode {
    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("zmq_adapter: configuration error: {e}");
            return std::process::ExitCode::from(1);
        }
    };

    if let Err(e) = logging::init(config.debug) {
        eprintln!("zmq_adapter: failed to initialize logging: {e}");
        return std::process::ExitCode::from(1);
    }

    if let Err(e) = supervisor::install_signal_handlers() {
        tracing::error!(error = %e, "failed to install signal handlers");
        return std::process::ExitCode::from(1);
    }

    match supervisor::run(&config) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "bridge terminated with an error");
            std::process::ExitCode::SUCCESS
        }
    }
}
