use crate::KinitError;
use std::{
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        mpsc::{self, Receiver},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_CHUNK: usize = 4096;

#[derive(Debug)]
pub(super) struct Finished {
    pub(super) status: ExitStatus,
    pub(super) stdout: String,
    pub(super) stderr: String,
}

/// Runs `command` to completion, or until `timeout` expires when one is set.
///
/// The deadline covers both the wait and the collection of output. A timeout
/// too large to represent as an `Instant` behaves as no timeout.
pub(super) fn run(
    program: &str,
    command: &mut Command,
    timeout: Option<Duration>,
) -> Result<Finished, KinitError> {
    let launch_error = |source: io::Error| KinitError::Launch {
        program: program.to_owned(),
        source,
    };

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(launch_error)?;
    let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

    // Pipes are drained off-thread so a child filling one cannot stall `wait`
    let stdout = Capture::start(child.stdout.take());
    let stderr = Capture::start(child.stderr.take());

    let status = match (timeout, deadline) {
        (Some(timeout), Some(deadline)) => match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                // Readers are left detached, a grandchild may still hold the pipes
                return Err(KinitError::TimedOut {
                    program: program.to_owned(),
                    timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(launch_error(e));
            }
        },
        _ => child.wait().map_err(launch_error)?,
    };

    Ok(Finished {
        status,
        stdout: stdout.finish(deadline),
        stderr: stderr.finish(deadline),
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Output of one pipe, filled by a reader thread as it arrives.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Option<Receiver<()>>,
}

impl Capture {
    fn start<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(vec![]));
        let done = pipe.map(|mut pipe| {
            let (tx, rx) = mpsc::channel();
            let shared = Arc::clone(&buf);
            thread::spawn(move || {
                let mut chunk = [0; READ_CHUNK];
                while let Ok(n) = pipe.read(&mut chunk) {
                    if n == 0 {
                        break;
                    }
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]);
                }
                let _ = tx.send(());
            });
            rx
        });
        Self { buf, done }
    }

    /// Waits for end of stream, giving up at `deadline` with what has been read.
    fn finish(self, deadline: Option<Instant>) -> String {
        if let Some(done) = self.done {
            let _ = match deadline {
                None => done.recv().ok(),
                Some(deadline) => done
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    .ok(),
            };
        }
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        let text = String::from_utf8_lossy(&buf).trim().to_owned();
        text
    }
}
