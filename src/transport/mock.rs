//! Scripted transport for tests.
//!
//! `MockTransport` plays the role of the channel factory and records every
//! command and file operation. Tests script command responses, inject
//! connect/command/file failures, and can hold connections on a gate to keep
//! a check in flight deterministically.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Result, SherpaError};
use crate::registry::EnvironmentDescriptor;

use super::{Channel, ChannelFactory, ExecOutput, FileTransfer};

/// Home directory reported by the mock host.
pub const MOCK_HOME: &str = "/home/test";

#[derive(Default)]
struct MockState {
    responses: Mutex<HashMap<String, VecDeque<ExecOutput>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    dirs: Mutex<HashSet<String>>,
    commands_run: Mutex<Vec<String>>,
    fail_connect: Mutex<Option<String>>,
    fail_commands: Mutex<Option<String>>,
    fail_file_ops: Mutex<Option<String>>,
    connections: AtomicUsize,
    gate: Mutex<Option<Arc<GateState>>>,
}

struct GateState {
    released: Mutex<bool>,
    cv: Condvar,
    arrived: AtomicUsize,
}

/// Handle to a connection gate installed with [`MockTransport::hold_connections`].
pub struct ConnectGate {
    state: Arc<GateState>,
}

impl ConnectGate {
    /// Let all held and future connections proceed.
    pub fn release(&self) {
        let mut released = self.state.released.lock().unwrap();
        *released = true;
        self.state.cv.notify_all();
    }

    /// How many connection attempts have reached the gate.
    pub fn arrived(&self) -> usize {
        self.state.arrived.load(Ordering::SeqCst)
    }
}

/// Scripted channel factory for tests.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        let transport = Self::default();
        // The machine adapter resolves `~` through this query.
        transport.respond(crate::remote::HOME_QUERY, 0, MOCK_HOME);
        transport
    }

    /// Script the response for a shell command.
    ///
    /// Calling this again for the same command queues a follow-up response;
    /// responses are consumed in order and the last one repeats. This lets
    /// a test script "absent before install, present after".
    pub fn respond(&self, command: &str, exit_code: i32, stdout: &str) {
        self.state
            .responses
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(ExecOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            });
    }

    /// Drop any scripted responses for a command.
    pub fn clear_response(&self, command: &str) {
        self.state.responses.lock().unwrap().remove(command);
    }

    /// Make every subsequent connection attempt fail.
    pub fn fail_connections(&self, message: &str) {
        *self.state.fail_connect.lock().unwrap() = Some(message.to_string());
    }

    /// Make every subsequent command execution fail with a transport error.
    pub fn fail_commands(&self, message: &str) {
        *self.state.fail_commands.lock().unwrap() = Some(message.to_string());
    }

    /// Make every subsequent file operation fail with a transport error.
    pub fn fail_file_ops(&self, message: &str) {
        *self.state.fail_file_ops.lock().unwrap() = Some(message.to_string());
    }

    /// Hold future connection attempts until the returned gate is released.
    pub fn hold_connections(&self) -> ConnectGate {
        let state = Arc::new(GateState {
            released: Mutex::new(false),
            cv: Condvar::new(),
            arrived: AtomicUsize::new(0),
        });
        *self.state.gate.lock().unwrap() = Some(state.clone());
        ConnectGate { state }
    }

    /// Seed a remote file.
    pub fn put_file(&self, path: &str, bytes: &[u8]) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
    }

    /// Current contents of a remote file, if present.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(path).cloned()
    }

    /// Every shell command run so far, in order.
    pub fn commands_run(&self) -> Vec<String> {
        self.state.commands_run.lock().unwrap().clone()
    }

    /// How many times a specific command has run.
    pub fn runs_of(&self, command: &str) -> usize {
        self.state
            .commands_run
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }

    /// How many connections have been opened successfully.
    pub fn connections_opened(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

impl ChannelFactory for MockTransport {
    fn open(&self, _descriptor: &EnvironmentDescriptor) -> Result<Box<dyn Channel>> {
        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.arrived.fetch_add(1, Ordering::SeqCst);
            let released = gate.released.lock().unwrap();
            let _released = gate
                .cv
                .wait_while(released, |released| !*released)
                .unwrap();
        }

        if let Some(message) = self.state.fail_connect.lock().unwrap().clone() {
            return Err(SherpaError::transport(message));
        }

        self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockChannel {
            state: self.state.clone(),
        }))
    }
}

struct MockChannel {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel").finish_non_exhaustive()
    }
}

impl Channel for MockChannel {
    fn run_command(&self, argv: &[&str]) -> Result<ExecOutput> {
        // The machine adapter wraps shell commands as `sh -lc <cmd>`;
        // key scripted responses on the inner command.
        let key = if argv.len() == 3 && argv[0] == "sh" && argv[1] == "-lc" {
            argv[2].to_string()
        } else {
            argv.join(" ")
        };
        self.state.commands_run.lock().unwrap().push(key.clone());

        if let Some(message) = self.state.fail_commands.lock().unwrap().clone() {
            return Err(SherpaError::transport(message));
        }

        let mut responses = self.state.responses.lock().unwrap();
        let output = responses.get_mut(&key).map(|queue| {
            if queue.len() > 1 {
                queue.pop_front().expect("non-empty queue")
            } else {
                queue.front().cloned().expect("non-empty queue")
            }
        });
        Ok(output.unwrap_or_else(|| ExecOutput {
            exit_code: 127,
            stdout: String::new(),
            stderr: format!("{}: command not found", key),
        }))
    }

    fn file_transfer(&self) -> Result<Box<dyn FileTransfer>> {
        Ok(Box::new(MockFileTransfer {
            state: self.state.clone(),
        }))
    }
}

struct MockFileTransfer {
    state: Arc<MockState>,
}

impl MockFileTransfer {
    fn check_failure(&self) -> Result<()> {
        if let Some(message) = self.state.fail_file_ops.lock().unwrap().clone() {
            return Err(SherpaError::transport(message));
        }
        Ok(())
    }
}

impl FileTransfer for MockFileTransfer {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.check_failure()?;
        self.state
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SherpaError::transport(format!("no such file: {}", path)))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.check_failure()?;
        self.state
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.check_failure()?;
        if self.state.files.lock().unwrap().contains_key(path) {
            return Ok(true);
        }
        Ok(self.state.dirs.lock().unwrap().contains(path))
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        self.check_failure()?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(self
            .state
            .files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect())
    }

    fn mkdir_all(&self, path: &str) -> Result<()> {
        self.check_failure()?;
        self.state.dirs.lock().unwrap().insert(path.to_string());
        Ok(())
    }
}
