//! Trait for plugging custom thread pools into wsio.

use crate::wsio_error::WsioResult;
use std::fmt::Debug;
use std::thread;

/// A unit of background work handed to a [`ThreadAdapter`].
pub type ThreadAdapterTask = Box<dyn FnOnce() + Send>;

/// Abstraction over thread spawning.
///
/// wsio needs background threads in two places: the duplex pump threads of a
/// TLS transport and the completion of an asynchronous frame read. Both go
/// through this trait so embedders can route them into their own pool.
pub trait ThreadAdapter: Debug + Send + Sync {
  /// Spawns the task. The task must eventually run to completion.
  fn spawn(&self, task: ThreadAdapterTask) -> WsioResult<()>;
}

/// Spawns one detached OS thread per task using `thread::Builder::new().spawn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultThreadAdapter;

impl ThreadAdapter for DefaultThreadAdapter {
  fn spawn(&self, task: ThreadAdapterTask) -> WsioResult<()> {
    let _ = thread::Builder::new().spawn(task)?;
    Ok(())
  }
}
