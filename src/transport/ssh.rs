//! `ssh2`-backed transport.
//!
//! One [`SshChannel`] wraps one authenticated `ssh2::Session`; commands run
//! through exec channels and file transfer rides on SFTP. Connection
//! establishment is bounded by the configured timeout, after which the
//! failure surfaces as a `Transport` error.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::{ErrorCode, Session, Sftp};

use crate::error::{Result, SherpaError};
use crate::registry::{ConnectionTarget, EnvironmentDescriptor, SshAuth};

use super::{Channel, ChannelFactory, ExecOutput, FileTransfer};

/// SFTP status code for a missing remote path.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Opens authenticated SSH sessions to remote environments.
pub struct SshChannelFactory {
    connect_timeout: Duration,
}

impl SshChannelFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl ChannelFactory for SshChannelFactory {
    fn open(&self, descriptor: &EnvironmentDescriptor) -> Result<Box<dyn Channel>> {
        let (host, port, user, auth) = match descriptor.target() {
            ConnectionTarget::Ssh {
                host,
                port,
                user,
                auth,
            } => (host.as_str(), *port, user.as_str(), auth),
            ConnectionTarget::Local => {
                return Err(SherpaError::transport(format!(
                    "environment '{}' is not a remote target",
                    descriptor.name()
                )))
            }
        };

        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|err| {
                SherpaError::transport(format!("cannot resolve {}:{}: {}", host, port, err))
            })?
            .next()
            .ok_or_else(|| {
                SherpaError::transport(format!("no address for {}:{}", host, port))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|err| {
            SherpaError::transport(format!("cannot connect to {}:{}: {}", host, port, err))
        })?;
        tcp.set_read_timeout(Some(self.connect_timeout)).ok();
        tcp.set_write_timeout(Some(self.connect_timeout)).ok();

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(self.connect_timeout.as_millis() as u32);
        session.handshake()?;

        authenticate(&session, user, auth)?;
        if !session.authenticated() {
            return Err(SherpaError::transport(format!(
                "SSH authentication failed for {}@{}",
                user, host
            )));
        }

        Ok(Box::new(SshChannel { session }))
    }
}

fn authenticate(session: &Session, user: &str, auth: &SshAuth) -> Result<()> {
    match auth {
        SshAuth::Agent => session.userauth_agent(user)?,
        SshAuth::Password(password) => session.userauth_password(user, password)?,
        SshAuth::KeyFile { path, passphrase } => {
            session.userauth_pubkey_file(user, None, path, passphrase.as_deref())?
        }
    }
    Ok(())
}

/// One open SSH session.
struct SshChannel {
    session: Session,
}

impl std::fmt::Debug for SshChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshChannel").finish_non_exhaustive()
    }
}

impl Channel for SshChannel {
    fn run_command(&self, argv: &[&str]) -> Result<ExecOutput> {
        let command = shell_join(argv);

        let mut channel = self.session.channel_session()?;
        channel.exec(&command)?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|err| SherpaError::transport(format!("reading stdout: {}", err)))?;

        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|err| SherpaError::transport(format!("reading stderr: {}", err)))?;

        channel.wait_close()?;
        let exit_code = channel.exit_status()?;

        Ok(ExecOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    fn file_transfer(&self) -> Result<Box<dyn FileTransfer>> {
        let sftp = self.session.sftp()?;
        Ok(Box::new(SftpTransfer { sftp }))
    }
}

/// SFTP-backed file transfer.
struct SftpTransfer {
    sftp: Sftp,
}

impl FileTransfer for SftpTransfer {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.sftp.open(Path::new(path))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|err| SherpaError::transport(format!("reading {}: {}", path, err)))?;
        Ok(bytes)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let mut file = self.sftp.create(Path::new(path))?;
        file.write_all(bytes)
            .map_err(|err| SherpaError::transport(format!("writing {}: {}", path, err)))?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        match self.sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(err) if err.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let entries = self.sftp.readdir(Path::new(path))?;
        Ok(entries
            .into_iter()
            .filter_map(|(entry, _)| {
                entry
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
            })
            .collect())
    }

    fn mkdir_all(&self, path: &str) -> Result<()> {
        let mut prefix = String::new();
        for component in path.split('/') {
            if component.is_empty() {
                if prefix.is_empty() {
                    prefix.push('/');
                }
                continue;
            }
            if !prefix.is_empty() && !prefix.ends_with('/') {
                prefix.push('/');
            }
            prefix.push_str(component);

            if !self.exists(&prefix)? {
                self.sftp.mkdir(Path::new(&prefix), 0o755)?;
            }
        }
        Ok(())
    }
}

/// Join argv into a single shell command, quoting where needed.
fn shell_join(argv: &[&str]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@~".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
