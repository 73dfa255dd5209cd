//! Opt-in log output for C hosts.
//!
//! The library only emits `tracing` events; nothing is printed unless the
//! host installs a subscriber. C hosts without a Rust subscriber of their
//! own can call [`dsmem_init_logging`].

use tracing_subscriber::{fmt, EnvFilter};

use crate::status::DsStatus;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install a formatting subscriber on stderr, filtered by `RUST_LOG`.
///
/// Returns [`DsStatus::Failure`] if a global subscriber is already
/// installed; the existing one stays in place.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn dsmem_init_logging() -> i32 {
    ffi_guard!({
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let installed = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .try_init();
        match installed {
            Ok(()) => {
                tracing::debug!("dsmem logging initialised");
                DsStatus::Ok as i32
            }
            Err(_) => DsStatus::Failure as i32,
        }
    })
}
