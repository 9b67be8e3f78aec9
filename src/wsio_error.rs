//! Error types of the crate.
#![allow(missing_docs)]

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io;
use std::io::ErrorKind;

pub type WsioResult<T> = Result<T, WsioError>;

/// Errors raised while capturing the raw handshake block.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum HandshakeError {
  /// The terminator was not found within the handshake byte limit.
  /// Contains the amount of bytes consumed before giving up.
  TooLarge(usize),
}

impl Display for HandshakeError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      HandshakeError::TooLarge(consumed) => {
        write!(f, "handshake not terminated within the byte limit, {consumed} bytes consumed")
      }
    }
  }
}
impl Error for HandshakeError {}

#[derive(Debug)]
#[non_exhaustive]
pub enum WsioError {
  Handshake(HandshakeError),
  #[cfg(feature = "tls")]
  Tls(rustls::Error),
  IO(io::Error),
  Other(Box<dyn Error + Send + Sync>),
}

impl WsioError {
  pub fn new_io<E: Into<Box<dyn Error + Send + Sync>>>(kind: ErrorKind, message: E) -> WsioError {
    io::Error::new(kind, message).into()
  }

  pub fn from_io_kind(kind: ErrorKind) -> WsioError {
    io::Error::from(kind).into()
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      WsioError::IO(io) => io.kind(),
      WsioError::Handshake(_) => ErrorKind::InvalidData,
      #[cfg(feature = "tls")]
      WsioError::Tls(_) => ErrorKind::InvalidData,
      _ => ErrorKind::Other,
    }
  }

  pub fn downcast_ref<T: Error + Send + 'static>(&self) -> Option<&T> {
    match self {
      WsioError::Handshake(err) => (err as &dyn Error).downcast_ref::<T>(),
      #[cfg(feature = "tls")]
      WsioError::Tls(err) => (err as &dyn Error).downcast_ref::<T>(),
      WsioError::IO(err) => (err as &dyn Error).downcast_ref::<T>(),
      WsioError::Other(other) => other.downcast_ref::<T>(),
    }
  }

  pub fn into_inner(self) -> Box<dyn Error + Send + Sync + 'static> {
    match self {
      WsioError::Handshake(err) => Box::new(err) as Box<dyn Error + Send + Sync>,
      #[cfg(feature = "tls")]
      WsioError::Tls(err) => Box::new(err) as Box<dyn Error + Send + Sync>,
      WsioError::IO(err) => Box::new(err) as Box<dyn Error + Send + Sync>,
      WsioError::Other(other) => other,
    }
  }
}

impl Display for WsioError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      WsioError::Handshake(err) => Display::fmt(err, f),
      #[cfg(feature = "tls")]
      WsioError::Tls(err) => Display::fmt(err, f),
      WsioError::IO(err) => Display::fmt(err, f),
      WsioError::Other(err) => Display::fmt(err, f),
    }
  }
}

impl<T> From<T> for WsioError
where
  T: Error + Send + Sync + 'static,
{
  fn from(value: T) -> Self {
    let mut dyn_box = Box::new(value) as Box<dyn Error + Send + Sync>;
    dyn_box = match dyn_box.downcast::<io::Error>() {
      Ok(err) => return WsioError::IO(*err),
      Err(err) => err,
    };
    dyn_box = match dyn_box.downcast::<HandshakeError>() {
      Ok(err) => return WsioError::Handshake(*err),
      Err(err) => err,
    };
    #[cfg(feature = "tls")]
    {
      dyn_box = match dyn_box.downcast::<rustls::Error>() {
        Ok(err) => return WsioError::Tls(*err),
        Err(err) => err,
      };
    }

    WsioError::Other(dyn_box)
  }
}

impl From<WsioError> for Box<dyn Error + Send> {
  fn from(value: WsioError) -> Self {
    value.into_inner()
  }
}

impl From<WsioError> for io::Error {
  fn from(value: WsioError) -> Self {
    match value {
      WsioError::IO(io) => io,
      err => io::Error::new(err.kind(), err.into_inner()),
    }
  }
}
