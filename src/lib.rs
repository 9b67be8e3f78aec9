//! wsio is the connection transport layer of a WebSocket endpoint. It unifies
//! plain TCP and RustTls secured byte streams behind one [`Transport`]
//! boundary, builds transports for the client role, the server role and
//! already accepted listener connections, and layers a [`WsStream`] on top
//! that gives a connection setup path and a frame exchange path safe,
//! mutually independent access to the single underlying socket.
//!
//! The frame format itself is not interpreted here; frames cross the
//! [`codec::FrameCodec`] boundary opaquely. The handshake header block is
//! captured raw (bounded to [`handshake::HANDSHAKE_LIMIT`] bytes) and handed
//! back as logical header lines without any interpretation of their meaning.

#![warn(missing_docs)]

pub mod codec;
pub mod factory;
mod functional_traits;
pub mod handshake;
pub mod stream;
#[cfg(feature = "tls")]
mod tls_stream;
mod util;
pub mod ws_stream;
pub mod wsio_error;

pub use functional_traits::{DefaultThreadAdapter, ThreadAdapter, ThreadAdapterTask};
pub use stream::{IntoTransport, Transport};
#[cfg(feature = "tls")]
pub use tls_stream::{TlsCapableStream, TlsTransport};
pub use ws_stream::{FrameOutcome, WsStream};
pub use wsio_error::{HandshakeError, WsioError, WsioResult};
