use chrono::{DateTime, Local, Utc};
use clap::{CommandFactory, Parser};
use krb5_kinit::{prefix_progname_to_error_if_needed, Acquired, Authenticator, Context};
use once_cell::sync::Lazy;
use std::{process::ExitCode, time::Duration};

const PROGNAME: &str = "keytab-kinit";

static ARGS: Lazy<Args> = Lazy::new(Args::parse);

#[derive(Parser)]
#[command(name = PROGNAME, version)]
struct Args {
    /// keytab to authenticate with (Default is the default client keytab)
    #[arg(short = 'k', long = "keytab")]
    keytab: Option<String>,
    /// kinit program to run (Default is kinit on PATH)
    #[arg(short = 'p', long = "program")]
    program: Option<String>,
    /// gives up and kills kinit after this many seconds (Default waits forever)
    #[arg(short = 'T', long = "timeout")]
    timeout: Option<u64>,
    /// logs progress to standard error
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,

    principal: String,
}

fn main() -> ExitCode {
    init_tracing(ARGS.verbose);
    prefix_progname_to_error_if_needed(PROGNAME, run())
}

fn init_tracing(verbose: bool) {
    // Failures are already printed by `prefix_progname_to_error_if_needed`
    let default_filter = if verbose { "info" } else { "error" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn run() -> anyhow::Result<()> {
    if ARGS.principal.trim().is_empty() {
        return usage();
    }

    let authenticator = build_authenticator()?;
    let acquired = authenticator.keytab_kinit()?;
    report(&acquired);
    Ok(())
}

fn build_authenticator() -> anyhow::Result<Authenticator> {
    // The profile is only needed for values the command line leaves open
    let needs_profile = ARGS.keytab.is_none() || ARGS.program.is_none() || ARGS.timeout.is_none();
    let context = if needs_profile {
        Some(Context::init().map_err(|e| anyhow::anyhow!("{:#} while initializing krb5", e))?)
    } else {
        None
    };

    let keytab = match (&ARGS.keytab, &context) {
        (Some(keytab), _) => keytab.to_owned(),
        (None, Some(context)) => context
            .default_client_keytab_name()
            .map_err(|e| anyhow::anyhow!("{:#} while getting default client keytab", e))?,
        (None, None) => unreachable!(),
    };

    let mut authenticator = Authenticator::new(keytab, ARGS.principal.as_str());

    if let Some(program) = ARGS
        .program
        .to_owned()
        .or_else(|| context.as_ref().and_then(Context::kinit_program))
    {
        authenticator = authenticator.with_program(program);
    }

    let timeout = match (ARGS.timeout, &context) {
        (Some(0), _) => None,
        (Some(secs), _) => Some(Duration::from_secs(secs)),
        (None, Some(context)) => context
            .kinit_timeout()
            .map_err(|e| anyhow::anyhow!("{:#} while reading kinit timeout", e))?,
        (None, None) => None,
    };

    Ok(authenticator.with_timeout(timeout))
}

fn report(acquired: &Acquired) {
    println!(
        "kinit successful for {} at {}",
        acquired.principal,
        timestamp_to_sfstring(acquired.acquired_at)
    );
}

fn timestamp_to_sfstring(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%x %X").to_string()
}

fn usage() -> anyhow::Result<()> {
    Err(anyhow::anyhow!(Args::command().render_help()))
}
