use std::{fmt, io, time::Duration};

/// Failure of a single `kinit` invocation.
#[derive(Debug)]
pub enum KinitError {
    /// The program could not be located, spawned, or waited on.
    Launch { program: String, source: io::Error },
    /// The program ran and did not exit successfully.
    Exited {
        program: String,
        code: Option<i32>,
        signal: Option<i32>,
        diagnostic: String,
    },
    /// The configured bounded wait expired and the program was killed.
    TimedOut { program: String, timeout: Duration },
}

impl KinitError {
    pub fn program(&self) -> &str {
        match self {
            Self::Launch { program, .. }
            | Self::Exited { program, .. }
            | Self::TimedOut { program, .. } => program,
        }
    }

    /// Exit code reported by the program, if it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited { code, .. } => *code,
            _ => None,
        }
    }

    /// Diagnostic text the program wrote, empty when there was none.
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Exited { diagnostic, .. } => diagnostic,
            _ => "",
        }
    }
}

impl fmt::Display for KinitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { program, source } => {
                write!(f, "{} while launching {}", source, program)
            }
            Self::Exited {
                program,
                code,
                signal,
                diagnostic,
            } => {
                match (code, signal) {
                    (Some(code), _) => write!(f, "{} exited with status {}", program, code)?,
                    (None, Some(signal)) => write!(f, "{} terminated by signal {}", program, signal)?,
                    (None, None) => write!(f, "{} exited with unknown status", program)?,
                }
                if diagnostic.is_empty() {
                    write!(f, " (no diagnostic output)")
                } else {
                    write!(f, ": {}", diagnostic)
                }
            }
            Self::TimedOut { program, timeout } => write!(
                f,
                "{} did not finish within {:.1}s and was killed",
                program,
                timeout.as_secs_f64()
            ),
        }
    }
}

impl std::error::Error for KinitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch { source, .. } => Some(source),
            _ => None,
        }
    }
}
