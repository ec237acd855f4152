//! Per-check session owning the remote channel.

use crate::error::Result;
use crate::registry::EnvironmentDescriptor;
use crate::transport::{Channel, ChannelFactory};

use super::{RemoteFileSystem, RemoteMachine};

/// One check's exclusive handle to a remote host.
///
/// Owns the opened channel; dropping the session closes it. Created and
/// torn down per check regardless of outcome, never shared across checks.
#[derive(Debug)]
pub struct RemoteSession {
    channel: Box<dyn Channel>,
}

impl RemoteSession {
    /// Open a session to the descriptor's target.
    pub fn open(
        factory: &dyn ChannelFactory,
        descriptor: &EnvironmentDescriptor,
    ) -> Result<Self> {
        let channel = factory.open(descriptor)?;
        Ok(Self { channel })
    }

    /// The command-execution surface of this session.
    pub fn machine(&self) -> RemoteMachine<'_> {
        RemoteMachine::new(self.channel.as_ref())
    }

    /// Open the file-system surface of this session.
    pub fn file_system(&self) -> Result<RemoteFileSystem> {
        Ok(RemoteFileSystem::new(self.channel.file_transfer()?))
    }
}
