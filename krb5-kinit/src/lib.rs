pub mod authenticator;
pub mod context;
pub mod error;

pub use self::{
    authenticator::{Acquired, Authenticator, KINIT},
    context::{Conf, Context, Profile},
    error::KinitError,
};

use std::process::ExitCode;

pub fn prefix_progname_to_error_if_needed(progname: &str, result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) if err.to_string().starts_with(&format!("Usage: {}", progname)) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{}: {:#}", progname, err);
            ExitCode::FAILURE
        }
    }
}
