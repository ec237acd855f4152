//! Check orchestration across remote environments.
//!
//! The checker enumerates the registry, filters to remote environments, and
//! drives the connect → detect → install flow for each. Checks for distinct
//! environments run in parallel; a second check request for an environment
//! already being checked is dropped. The validity tracker is the only state
//! shared between checks, and its answer is what [`Checker::is_ok`] returns.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::diagnostics;
use crate::error::{Result, SherpaError};
use crate::package::{detect, install, InstallListener, PackageRequirement, Payload, Presence};
use crate::registry::{EnvironmentDescriptor, EnvironmentId, EnvironmentRegistry};
use crate::remote::RemoteSession;
use crate::transport::ChannelFactory;
use crate::validity::ValidityTracker;

/// Terminal result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A check for this environment was already in flight; this one was dropped.
    Skipped,

    /// The channel could not be established. Validity state untouched.
    ConnectFailed,

    /// Connected, but the package state could not be determined.
    /// Validity state untouched.
    DetectFailed,

    /// The package is installed at an acceptable version.
    PresenceConfirmed,

    /// The package was missing or stale and was installed successfully.
    Installed,

    /// The install ran and failed; the environment is now marked invalid.
    InstallFailed,
}

impl CheckOutcome {
    /// Whether this outcome settled the environment as unusable.
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckOutcome::InstallFailed)
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CheckOutcome::Skipped => "check already in flight, skipped",
            CheckOutcome::ConnectFailed => "can't connect",
            CheckOutcome::DetectFailed => "detection failed",
            CheckOutcome::PresenceConfirmed => "package present",
            CheckOutcome::Installed => "package installed",
            CheckOutcome::InstallFailed => "install failed",
        };
        f.write_str(text)
    }
}

/// Outcome of one check, tagged with the environment it ran against.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub id: EnvironmentId,
    pub name: String,
    pub outcome: CheckOutcome,
}

/// Drives provisioning checks and owns the per-environment serialization.
pub struct Checker {
    registry: Arc<dyn EnvironmentRegistry>,
    factory: Arc<dyn ChannelFactory>,
    requirement: PackageRequirement,
    payload: Payload,
    tracker: Arc<ValidityTracker>,
    in_flight: Mutex<HashSet<EnvironmentId>>,
}

impl Checker {
    pub fn new(
        registry: Arc<dyn EnvironmentRegistry>,
        factory: Arc<dyn ChannelFactory>,
        requirement: PackageRequirement,
        payload: Payload,
        tracker: Arc<ValidityTracker>,
    ) -> Self {
        Self {
            registry,
            factory,
            requirement,
            payload,
            tracker,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether an environment is currently usable.
    ///
    /// Safe to call at any time, including during an in-flight check; it
    /// returns the last settled answer until the check updates it.
    pub fn is_ok(&self, id: &EnvironmentId) -> bool {
        self.tracker.is_valid(id)
    }

    /// Check every remote environment in the registry, in parallel.
    ///
    /// One environment's failure never aborts the others; each gets its own
    /// report.
    pub fn check_all(&self) -> Vec<CheckReport> {
        let descriptors: Vec<EnvironmentDescriptor> = self
            .registry
            .environments()
            .into_iter()
            .filter(EnvironmentDescriptor::is_remote)
            .collect();

        thread::scope(|scope| {
            let handles: Vec<_> = descriptors
                .iter()
                .map(|descriptor| scope.spawn(move || self.check_env(descriptor)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("check thread panicked"))
                .collect()
        })
    }

    /// Check one environment by registry name.
    ///
    /// Local environments are skipped; unknown names are an error.
    pub fn check_named(&self, name: &str) -> Result<CheckReport> {
        let descriptor = self
            .registry
            .find(name)
            .ok_or_else(|| SherpaError::UnknownEnvironment {
                name: name.to_string(),
            })?;

        if !descriptor.is_remote() {
            tracing::debug!("{} is local, nothing to check", name);
            return Ok(CheckReport {
                id: descriptor.id().clone(),
                name: descriptor.name().to_string(),
                outcome: CheckOutcome::Skipped,
            });
        }

        Ok(self.check_env(&descriptor))
    }

    /// Run one check against a descriptor.
    ///
    /// Serialized per environment identity: if a check for the same identity
    /// is already in flight, this request is dropped with
    /// [`CheckOutcome::Skipped`] and no remote work happens.
    pub fn check_env(&self, descriptor: &EnvironmentDescriptor) -> CheckReport {
        let id = descriptor.id().clone();
        let name = descriptor.name().to_string();

        let _guard = match self.begin(&id) {
            Some(guard) => guard,
            None => {
                tracing::debug!("check already in flight for {}", name);
                return CheckReport {
                    id,
                    name,
                    outcome: CheckOutcome::Skipped,
                };
            }
        };

        tracing::info!("Checking remote package for {}", name);
        let outcome = self.run_check(descriptor);
        tracing::debug!("{}: {}", name, outcome);

        CheckReport { id, name, outcome }
    }

    /// Connect, detect, and install as needed. The session is torn down when
    /// this returns, whatever the outcome.
    fn run_check(&self, descriptor: &EnvironmentDescriptor) -> CheckOutcome {
        let name = descriptor.name();

        let session = match RemoteSession::open(self.factory.as_ref(), descriptor) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!("Can't connect");
                if !err.is_indeterminate() {
                    diagnostics::capture(name, "connect", &err.to_string());
                }
                tracing::debug!("{}: {}", name, err);
                return CheckOutcome::ConnectFailed;
            }
        };

        let fs = match session.file_system() {
            Ok(fs) => fs,
            Err(err) => {
                tracing::warn!("{}: cannot open file transfer: {}", name, err);
                return CheckOutcome::DetectFailed;
            }
        };
        let machine = session.machine();

        match detect(&fs, &machine, &self.requirement) {
            Ok(Presence::Present { version }) => {
                tracing::info!("{}: {} {} present", name, self.requirement.name, version);
                self.tracker.mark_valid(descriptor.id());
                CheckOutcome::PresenceConfirmed
            }
            Ok(presence) => {
                if let Presence::Incompatible { installed } = &presence {
                    tracing::info!(
                        "{}: {} {} below minimum {}, reinstalling",
                        name,
                        self.requirement.name,
                        installed,
                        self.requirement.min_version
                    );
                }
                self.run_install(&fs, &machine, descriptor)
            }
            Err(err) if err.is_indeterminate() => {
                tracing::warn!("{}: cannot determine package state: {}", name, err);
                CheckOutcome::DetectFailed
            }
            Err(err) => {
                diagnostics::capture(name, "detect", &err.to_string());
                tracing::warn!("{}: unexpected failure during detection: {}", name, err);
                CheckOutcome::DetectFailed
            }
        }
    }

    fn run_install(
        &self,
        fs: &crate::remote::RemoteFileSystem,
        machine: &crate::remote::RemoteMachine<'_>,
        descriptor: &EnvironmentDescriptor,
    ) -> CheckOutcome {
        let mut listener = ValidityListener {
            tracker: &self.tracker,
            id: descriptor.id(),
        };

        match install(fs, machine, &self.requirement, &self.payload, &mut listener) {
            Ok(()) => CheckOutcome::Installed,
            Err(err) => {
                // The listener already marked the environment invalid; a
                // mid-install failure leaves the host possibly half-modified.
                tracing::warn!("{}: {}", descriptor.name(), err);
                CheckOutcome::InstallFailed
            }
        }
    }

    fn begin(&self, id: &EnvironmentId) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            checker: self,
            id: id.clone(),
        })
    }
}

/// Marks validity from install lifecycle events.
///
/// `started` flips the environment to invalid so concurrent consumers never
/// treat a mid-install environment as usable.
struct ValidityListener<'a> {
    tracker: &'a ValidityTracker,
    id: &'a EnvironmentId,
}

impl InstallListener for ValidityListener<'_> {
    fn started(&mut self) {
        self.tracker.mark_invalid(self.id);
    }

    fn success(&mut self) {
        self.tracker.mark_valid(self.id);
    }

    fn fail(&mut self, _error: &SherpaError) {
        self.tracker.mark_invalid(self.id);
    }
}

/// Releases an environment's in-flight slot on drop.
struct InFlightGuard<'a> {
    checker: &'a Checker,
    id: EnvironmentId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.checker.in_flight.lock().unwrap().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PayloadSource;
    use crate::registry::{ConnectionTarget, EnvironmentDescriptor};
    use crate::transport::mock::MockTransport;
    use crate::version::Version;

    const VERSION_CMD: &str = "sherpa-agent --version";
    const INSTALL_CMD: &str = "sh /opt/agent/install.sh";

    struct StaticRegistry(Vec<EnvironmentDescriptor>);

    impl EnvironmentRegistry for StaticRegistry {
        fn environments(&self) -> Vec<EnvironmentDescriptor> {
            self.0.clone()
        }
    }

    fn remote_descriptor(name: &str) -> EnvironmentDescriptor {
        EnvironmentDescriptor::new(
            name,
            ConnectionTarget::Ssh {
                host: format!("{}.internal", name),
                port: 22,
                user: "ci".into(),
                auth: crate::registry::SshAuth::Agent,
            },
        )
    }

    fn requirement() -> PackageRequirement {
        PackageRequirement {
            name: "sherpa-agent".into(),
            min_version: Version::new(2, 1, 0),
            install_dir: "/opt/agent".into(),
            version_command: VERSION_CMD.into(),
            install_command: INSTALL_CMD.into(),
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

    fn build_checker(
        transport: &MockTransport,
        descriptors: Vec<EnvironmentDescriptor>,
        tracker: Arc<ValidityTracker>,
    ) -> Checker {
        Checker::new(
            Arc::new(StaticRegistry(descriptors)),
            Arc::new(transport.clone()),
            requirement(),
            payload(),
            tracker,
        )
    }

    #[test]
    fn present_package_confirms_and_marks_valid() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        // Start from known-bad: a successful check must clear it.
        tracker.mark_invalid(desc.id());

        let checker = build_checker(&transport, vec![desc.clone()], tracker);
        let report = checker.check_env(&desc);

        assert_eq!(report.outcome, CheckOutcome::PresenceConfirmed);
        assert!(checker.is_ok(desc.id()));
        assert_eq!(transport.runs_of(INSTALL_CMD), 0);
    }

    #[test]
    fn absent_package_installs_and_marks_valid() {
        let transport = MockTransport::new();
        // Absent before the install, present when verifying it.
        transport.respond(VERSION_CMD, 127, "");
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");
        transport.respond(INSTALL_CMD, 0, "installed");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::Installed);
        assert!(checker.is_ok(desc.id()));
        assert_eq!(transport.runs_of(INSTALL_CMD), 1);
    }

    #[test]
    fn stale_package_reinstalls() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.0.9");
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");
        transport.respond(INSTALL_CMD, 0, "");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::Installed);
        assert_eq!(transport.runs_of(INSTALL_CMD), 1);
        assert!(checker.is_ok(desc.id()));
    }

    #[test]
    fn failed_install_marks_invalid() {
        let transport = MockTransport::new();
        transport.respond(INSTALL_CMD, 1, "");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::InstallFailed);
        assert!(!checker.is_ok(desc.id()));
        assert!(report.outcome.is_failure());
    }

    #[test]
    fn install_that_verifies_absent_marks_invalid() {
        let transport = MockTransport::new();
        // Install command "succeeds" but the package never appears.
        transport.respond(INSTALL_CMD, 0, "");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::InstallFailed);
        assert!(!checker.is_ok(desc.id()));
    }

    #[test]
    fn connect_failure_leaves_unknown_state_valid() {
        let transport = MockTransport::new();
        transport.fail_connections("no route to host");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::ConnectFailed);
        assert!(checker.is_ok(desc.id()));
    }

    #[test]
    fn connect_failure_leaves_invalid_state_invalid() {
        let transport = MockTransport::new();
        transport.fail_connections("no route to host");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        tracker.mark_invalid(desc.id());

        let checker = build_checker(&transport, vec![desc.clone()], tracker);
        let report = checker.check_env(&desc);

        assert_eq!(report.outcome, CheckOutcome::ConnectFailed);
        assert!(!checker.is_ok(desc.id()));
    }

    #[test]
    fn transport_failure_during_detect_leaves_state_untouched() {
        let transport = MockTransport::new();

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], Arc::clone(&tracker));

        transport.fail_commands("connection dropped");
        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::DetectFailed);
        assert!(checker.is_ok(desc.id()));

        // Same failure with prior invalid state: still invalid afterwards.
        tracker.mark_invalid(desc.id());
        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::DetectFailed);
        assert!(!checker.is_ok(desc.id()));
    }

    #[test]
    fn malformed_version_output_is_detect_failure_not_reinstall() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 0, "words without numbers");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        let report = checker.check_env(&desc);
        assert_eq!(report.outcome, CheckOutcome::DetectFailed);
        assert_eq!(transport.runs_of(INSTALL_CMD), 0);
        assert!(checker.is_ok(desc.id()));
    }

    #[test]
    fn duplicate_concurrent_check_is_dropped() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 127, "");
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");
        transport.respond(INSTALL_CMD, 0, "");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = Arc::new(build_checker(&transport, vec![desc.clone()], tracker));

        // Hold the first check while it is connecting, then issue a second.
        let gate = transport.hold_connections();
        let handle = {
            let checker = Arc::clone(&checker);
            let desc = desc.clone();
            thread::spawn(move || checker.check_env(&desc))
        };
        while gate.arrived() == 0 {
            thread::yield_now();
        }

        let second = checker.check_env(&desc);
        assert_eq!(second.outcome, CheckOutcome::Skipped);

        gate.release();
        let first = handle.join().unwrap();
        assert_eq!(first.outcome, CheckOutcome::Installed);

        // Exactly one install ran against the host.
        assert_eq!(transport.runs_of(INSTALL_CMD), 1);
        assert_eq!(transport.connections_opened(), 1);
    }

    #[test]
    fn check_can_run_again_after_completion() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");

        let desc = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![desc.clone()], tracker);

        assert_eq!(
            checker.check_env(&desc).outcome,
            CheckOutcome::PresenceConfirmed
        );
        assert_eq!(
            checker.check_env(&desc).outcome,
            CheckOutcome::PresenceConfirmed
        );
        assert_eq!(transport.connections_opened(), 2);
    }

    #[test]
    fn check_all_filters_local_environments() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");

        let local = EnvironmentDescriptor::new("laptop", ConnectionTarget::Local);
        let remote = remote_descriptor("build-box");
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![local, remote], tracker);

        let reports = checker.check_all();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "build-box");
    }

    #[test]
    fn check_all_reports_every_remote_environment() {
        let transport = MockTransport::new();
        transport.respond(VERSION_CMD, 0, "sherpa-agent 2.1.0");

        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(
            &transport,
            vec![remote_descriptor("alpha"), remote_descriptor("beta")],
            tracker,
        );

        let reports = checker.check_all();
        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|r| r.outcome == CheckOutcome::PresenceConfirmed));
    }

    #[test]
    fn one_environment_failure_does_not_abort_others() {
        let transport = MockTransport::new();
        transport.fail_connections("down");

        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(
            &transport,
            vec![remote_descriptor("alpha"), remote_descriptor("beta")],
            tracker,
        );

        let reports = checker.check_all();
        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|r| r.outcome == CheckOutcome::ConnectFailed));
    }

    #[test]
    fn check_named_unknown_environment_errors() {
        let transport = MockTransport::new();
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![], tracker);

        let err = checker.check_named("ghost").unwrap_err();
        assert!(matches!(err, SherpaError::UnknownEnvironment { .. }));
    }

    #[test]
    fn check_named_local_environment_is_skipped() {
        let transport = MockTransport::new();
        let local = EnvironmentDescriptor::new("laptop", ConnectionTarget::Local);
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![local], tracker);

        let report = checker.check_named("laptop").unwrap();
        assert_eq!(report.outcome, CheckOutcome::Skipped);
        assert_eq!(transport.connections_opened(), 0);
    }

    #[test]
    fn never_checked_environment_is_ok() {
        let transport = MockTransport::new();
        let tracker = Arc::new(ValidityTracker::new());
        let checker = build_checker(&transport, vec![], tracker);

        assert!(checker.is_ok(&EnvironmentId::new("never-checked")));
    }
}
