//! Package installation on a remote host.
//!
//! The install sequence uploads the payload, runs the install command, and
//! verifies the result with the presence detector. Lifecycle events go to an
//! [`InstallListener`]; callbacks are synchronous on the installer's thread
//! and `fail` fires at most once.

use crate::error::{Result, SherpaError};
use crate::remote::{resolve_path, RemoteFileSystem, RemoteMachine};

use super::detect::{detect, Presence};
use super::payload::{sha256_hex, Payload};
use super::requirement::PackageRequirement;

/// Receives install lifecycle events.
///
/// `started` means the environment must be treated as provisionally invalid
/// until `success` arrives; any failure after `started` leaves the
/// environment in an unknown, possibly half-modified state.
pub trait InstallListener {
    fn started(&mut self);
    fn success(&mut self);
    fn fail(&mut self, error: &SherpaError);
}

/// Run the full install sequence against one remote host.
///
/// Every step is guarded: the first failure fires `listener.fail`, skips
/// the remaining steps, and is returned to the caller.
pub fn install(
    fs: &RemoteFileSystem,
    machine: &RemoteMachine<'_>,
    requirement: &PackageRequirement,
    payload: &Payload,
    listener: &mut dyn InstallListener,
) -> Result<()> {
    listener.started();

    let result = run_steps(fs, machine, requirement, payload);
    match &result {
        Ok(()) => listener.success(),
        Err(error) => listener.fail(error),
    }
    result
}

fn run_steps(
    fs: &RemoteFileSystem,
    machine: &RemoteMachine<'_>,
    requirement: &PackageRequirement,
    payload: &Payload,
) -> Result<()> {
    let install_dir = resolve_path(machine, &requirement.install_dir)?;
    fs.mkdir_all(&install_dir)?;

    let destination = format!(
        "{}/{}",
        install_dir.trim_end_matches('/'),
        payload.file_name
    );
    fs.write(&destination, &payload.bytes)?;

    // Read back and compare digests before executing anything remote.
    let uploaded = fs.read(&destination)?;
    if sha256_hex(&uploaded) != payload.digest() {
        return Err(SherpaError::Install {
            package: requirement.name.clone(),
            message: format!("payload digest mismatch after upload to {}", destination),
        });
    }

    tracing::info!("installing {} on remote host", requirement.name);
    let output = machine.run_shell(&requirement.install_command)?;
    if !output.success() {
        return Err(SherpaError::Install {
            package: requirement.name.clone(),
            message: format!(
                "install command exited {}: {}",
                output.exit_code,
                output.error_excerpt()
            ),
        });
    }

    match detect(fs, machine, requirement)? {
        Presence::Present { version } => {
            tracing::info!("{} {} verified after install", requirement.name, version);
            Ok(())
        }
        Presence::Absent => Err(SherpaError::Install {
            package: requirement.name.clone(),
            message: "package still absent after install".to_string(),
        }),
        Presence::Incompatible { installed } => Err(SherpaError::Install {
            package: requirement.name.clone(),
            message: format!(
                "installed version {} still below minimum {}",
                installed, requirement.min_version
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::payload::PayloadSource;
    use crate::registry::{ConnectionTarget, EnvironmentDescriptor};
    use crate::transport::mock::MockTransport;
    use crate::transport::{Channel, ChannelFactory};
    use crate::version::Version;

    /// Records every listener callback in order.
    #[derive(Default)]
    struct RecordingListener {
        events: Vec<String>,
    }

    impl InstallListener for RecordingListener {
        fn started(&mut self) {
            self.events.push("started".to_string());
        }

        fn success(&mut self) {
            self.events.push("success".to_string());
        }

        fn fail(&mut self, error: &SherpaError) {
            self.events.push(format!("fail: {}", error));
        }
    }

    fn requirement() -> PackageRequirement {
        PackageRequirement {
            name: "sherpa-agent".into(),
            min_version: Version::new(2, 1, 0),
            install_dir: "/opt/agent".into(),
            version_command: "sherpa-agent --version".into(),
            install_command: "sh /opt/agent/install.sh".into(),
            manifest: "/opt/agent/VERSION".into(),
            payload: PayloadSource::Embedded,
        }
    }

    fn payload() -> Payload {
        Payload {
            file_name: "install.sh".into(),
            bytes: b"#!/bin/sh\necho install\n".to_vec(),
        }
    }

    fn open(transport: &MockTransport) -> Box<dyn Channel> {
        let desc = EnvironmentDescriptor::new("box", ConnectionTarget::Local);
        transport.open(&desc).unwrap()
    }

    fn run_install(
        transport: &MockTransport,
        requirement: &PackageRequirement,
        listener: &mut RecordingListener,
    ) -> Result<()> {
        let channel = open(transport);
        let fs = RemoteFileSystem::new(channel.file_transfer().unwrap());
        let machine = RemoteMachine::new(channel.as_ref());
        install(&fs, &machine, requirement, &payload(), listener)
    }

    #[test]
    fn successful_install_fires_started_then_success() {
        let transport = MockTransport::new();
        transport.respond("sh /opt/agent/install.sh", 0, "installed");
        transport.respond("sherpa-agent --version", 0, "sherpa-agent 2.1.0");

        let mut listener = RecordingListener::default();
        run_install(&transport, &requirement(), &mut listener).unwrap();

        assert_eq!(listener.events, vec!["started", "success"]);
        // The payload landed where the install command expects it.
        assert_eq!(
            transport.file("/opt/agent/install.sh").unwrap(),
            payload().bytes
        );
    }

    #[test]
    fn nonzero_install_command_fails_once() {
        let transport = MockTransport::new();
        transport.respond("sh /opt/agent/install.sh", 1, "");

        let mut listener = RecordingListener::default();
        let err = run_install(&transport, &requirement(), &mut listener).unwrap_err();

        assert!(matches!(err, SherpaError::Install { .. }));
        assert_eq!(listener.events.len(), 2);
        assert_eq!(listener.events[0], "started");
        assert!(listener.events[1].starts_with("fail:"));
    }

    #[test]
    fn verification_still_absent_fails() {
        let transport = MockTransport::new();
        transport.respond("sh /opt/agent/install.sh", 0, "pretends to install");
        // Version command stays unavailable and no manifest appears.

        let mut listener = RecordingListener::default();
        let err = run_install(&transport, &requirement(), &mut listener).unwrap_err();

        assert!(matches!(err, SherpaError::Install { .. }));
        assert!(err.to_string().contains("still absent"));
        assert_eq!(listener.events[0], "started");
        assert!(listener.events[1].starts_with("fail:"));
    }

    #[test]
    fn verification_still_stale_fails() {
        let transport = MockTransport::new();
        transport.respond("sh /opt/agent/install.sh", 0, "");
        transport.respond("sherpa-agent --version", 0, "sherpa-agent 1.0.0");

        let mut listener = RecordingListener::default();
        let err = run_install(&transport, &requirement(), &mut listener).unwrap_err();

        assert!(matches!(err, SherpaError::Install { .. }));
        assert!(err.to_string().contains("below minimum"));
    }

    #[test]
    fn transport_failure_mid_install_fires_fail() {
        let transport = MockTransport::new();
        let channel = open(&transport);
        let fs = RemoteFileSystem::new(channel.file_transfer().unwrap());
        let machine = RemoteMachine::new(channel.as_ref());
        // Uploads succeed, then the link dies before the install command.
        transport.fail_commands("channel closed");

        let mut listener = RecordingListener::default();
        let err = install(&fs, &machine, &requirement(), &payload(), &mut listener).unwrap_err();

        assert!(matches!(err, SherpaError::Transport { .. }));
        assert_eq!(listener.events[0], "started");
        assert!(listener.events[1].starts_with("fail:"));
        assert_eq!(listener.events.len(), 2);
    }

    #[test]
    fn install_uses_remote_home_for_tilde_dir() {
        let transport = MockTransport::new();
        transport.respond("sh ~/.sherpa-agent/install.sh", 0, "");
        transport.respond("sherpa-agent --version", 0, "sherpa-agent 2.1.0");

        let mut req = requirement();
        req.install_dir = "~/.sherpa-agent".into();
        req.install_command = "sh ~/.sherpa-agent/install.sh".into();

        let mut listener = RecordingListener::default();
        run_install(&transport, &req, &mut listener).unwrap();

        assert!(transport
            .file("/home/test/.sherpa-agent/install.sh")
            .is_some());
    }
}
