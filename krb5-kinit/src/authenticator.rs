mod invocation;

use crate::KinitError;
use chrono::{DateTime, Utc};
use std::{
    path::{Path, PathBuf},
    process::Command,
    time::{Duration, Instant},
};

pub const KINIT: &str = "kinit";
const KEYTAB_FLAG: &str = "-kt";

/// Obtains an initial ticket-granting ticket for one principal from a keytab
/// by running `kinit -kt <keytab> <principal>`.
///
/// Construction stores its inputs verbatim and touches nothing on disk; a bad
/// keytab path or principal only surfaces as a failure of [`Self::keytab_kinit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticator {
    keytab: String,
    principal: String,
    program: PathBuf,
    timeout: Option<Duration>,
}

/// Outcome of a successful [`Authenticator::keytab_kinit`].
///
/// No ticket data is available, `kinit` only reports through its exit status
/// and the credential cache it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub principal: String,
    pub keytab: String,
    pub acquired_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl Authenticator {
    pub fn new(keytab: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            keytab: keytab.into(),
            principal: principal.into(),
            program: PathBuf::from(KINIT),
            timeout: None,
        }
    }

    /// Runs `program` instead of the `kinit` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Bounds the wait for the command; `None` blocks until it exits.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keytab(&self) -> &str {
        &self.keytab
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The command [`Self::keytab_kinit`] runs. Every value is a separate argv
    /// entry, nothing goes through a shell.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(KEYTAB_FLAG)
            .arg(&self.keytab)
            .arg(&self.principal);
        command
    }

    /// Makes exactly one `kinit` attempt and waits for it.
    pub fn keytab_kinit(&self) -> Result<Acquired, KinitError> {
        let program = self.program.display().to_string();
        tracing::debug!(
            program = %program,
            keytab = %self.keytab,
            principal = %self.principal,
            timeout = ?self.timeout,
            "running kinit"
        );

        let started = Instant::now();
        let result = invocation::run(&program, &mut self.command(), self.timeout);
        let elapsed = started.elapsed();

        let finished = match result {
            Ok(finished) => finished,
            Err(e) => {
                tracing::warn!(principal = %self.principal, error = %e, "kinit failed");
                return Err(e);
            }
        };

        if !finished.status.success() {
            let diagnostic = if finished.stderr.is_empty() {
                finished.stdout
            } else {
                finished.stderr
            };
            let err = KinitError::Exited {
                program,
                code: finished.status.code(),
                signal: exit_signal(&finished.status),
                diagnostic,
            };
            tracing::warn!(principal = %self.principal, error = %err, "kinit failed");
            return Err(err);
        }

        tracing::info!(
            principal = %self.principal,
            elapsed_ms = elapsed.as_millis() as u64,
            "kinit successful"
        );
        Ok(Acquired {
            principal: self.principal.to_owned(),
            keytab: self.keytab.to_owned(),
            acquired_at: Utc::now(),
            elapsed,
        })
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn construction_is_verbatim() {
        let authenticator = Authenticator::new("/nonexistent/path.keytab", "svc/host@EXAMPLE.COM");
        assert_eq!(authenticator.keytab(), "/nonexistent/path.keytab");
        assert_eq!(authenticator.principal(), "svc/host@EXAMPLE.COM");
        assert_eq!(authenticator.program(), Path::new(KINIT));
        assert_eq!(authenticator.timeout(), None);
    }

    #[test]
    fn command_passes_discrete_arguments() {
        let principal = "evil\"; rm -rf /@EXAMPLE.COM";
        let authenticator = Authenticator::new("/etc/krb5/valid $(id).keytab", principal);
        let command = authenticator.command();
        assert_eq!(command.get_program(), OsStr::new("kinit"));
        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(
            args,
            [
                OsStr::new("-kt"),
                OsStr::new("/etc/krb5/valid $(id).keytab"),
                OsStr::new(principal),
            ]
        );
    }

    #[test]
    fn program_override() {
        let authenticator = Authenticator::new("a.keytab", "svc/host@EXAMPLE.COM")
            .with_program("/opt/krb5/bin/kinit")
            .with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(
            authenticator.command().get_program(),
            OsStr::new("/opt/krb5/bin/kinit")
        );
        assert_eq!(authenticator.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Authenticator>();
        assert_send_sync::<KinitError>();
    }
}
