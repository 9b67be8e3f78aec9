use std::io;
use std::sync::LockResult;

pub fn unwrap_poison<T>(result: LockResult<T>) -> io::Result<T> {
  result.map_err(|_| io::Error::new(io::ErrorKind::Other, "Poisoned Mutex"))
}

/// Forwards to `log::error!` when the `log` feature is enabled, no-op otherwise.
#[cfg(feature = "log")]
#[macro_export]
macro_rules! error_log {
  ($($arg:tt)*) => { log::error!($($arg)*) };
}

/// Forwards to `log::error!` when the `log` feature is enabled, no-op otherwise.
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! error_log {
  ($($arg:tt)*) => {{
    if false {
      _ = std::format!($($arg)*);
    }
  }};
}

/// Forwards to `log::warn!` when the `log` feature is enabled, no-op otherwise.
#[cfg(feature = "log")]
#[macro_export]
macro_rules! warn_log {
  ($($arg:tt)*) => { log::warn!($($arg)*) };
}

/// Forwards to `log::warn!` when the `log` feature is enabled, no-op otherwise.
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! warn_log {
  ($($arg:tt)*) => {{
    if false {
      _ = std::format!($($arg)*);
    }
  }};
}

/// Forwards to `log::info!` when the `log` feature is enabled, no-op otherwise.
#[cfg(feature = "log")]
#[macro_export]
macro_rules! info_log {
  ($($arg:tt)*) => { log::info!($($arg)*) };
}

/// Forwards to `log::info!` when the `log` feature is enabled, no-op otherwise.
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! info_log {
  ($($arg:tt)*) => {{
    if false {
      _ = std::format!($($arg)*);
    }
  }};
}

/// Forwards to `log::debug!` when the `log` feature is enabled, no-op otherwise.
#[cfg(feature = "log")]
#[macro_export]
macro_rules! debug_log {
  ($($arg:tt)*) => { log::debug!($($arg)*) };
}

/// Forwards to `log::debug!` when the `log` feature is enabled, no-op otherwise.
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! debug_log {
  ($($arg:tt)*) => {{
    if false {
      _ = std::format!($($arg)*);
    }
  }};
}

/// Forwards to `log::trace!` when the `log` feature is enabled, no-op otherwise.
#[cfg(feature = "log")]
#[macro_export]
macro_rules! trace_log {
  ($($arg:tt)*) => { log::trace!($($arg)*) };
}

/// Forwards to `log::trace!` when the `log` feature is enabled, no-op otherwise.
#[cfg(not(feature = "log"))]
#[macro_export]
macro_rules! trace_log {
  ($($arg:tt)*) => {{
    if false {
      _ = std::format!($($arg)*);
    }
  }};
}
