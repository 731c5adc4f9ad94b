//! Producer side: the handle user code logs through, and the link that
//! carries handles into other processes.

mod handle;
#[cfg(unix)]
mod remote;

pub use handle::ProducerHandle;
#[cfg(unix)]
pub use remote::RemoteLink;
