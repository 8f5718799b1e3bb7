//! Line-driven session runner for terminals and scripted drills.
//!
//! Every line read from the input is treated as the full current text of the
//! input field, not as an increment.

use anyhow::{Context, Result};
use curfew_core::shutdown::{TerminationListener, TerminationSignal};
use curfew_core::{EnforcementSession, Projection, SessionState};
use curfew_provider::RegistryStore;
use log::{info, warn};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::Runtime;

/// Runtime and signal handlers for a headless session.
///
/// Must be created before the session starts so that a signal arriving while
/// the restriction is being applied is held for [`run_stdin`] instead of
/// killing the process.
pub struct Armed {
    runtime: Runtime,
    listener: TerminationListener,
}

impl Armed {
    pub fn install() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build the async runtime")?;
        let listener = {
            let _context = runtime.enter();
            TerminationListener::install().context("failed to install termination handlers")?
        };
        Ok(Self { runtime, listener })
    }
}

/// Drive a started session from stdin until it terminates.
pub fn run_stdin<S, P>(armed: Armed, session: &mut EnforcementSession<S, P>)
where
    S: RegistryStore,
    P: Projection,
{
    let Armed {
        runtime,
        mut listener,
    } = armed;
    runtime.block_on(drive(session, tokio::io::stdin(), listener.recv()));
    // A pending stdin read lives on a blocking thread that may never return.
    runtime.shutdown_background();
}

/// Feed lines from `reader` into the session, aborting on `shutdown` or EOF.
///
/// Bytes that are not valid UTF-8 are replaced rather than treated as a read
/// failure; only I/O errors end the session.
pub async fn drive<S, P, R, F>(session: &mut EnforcementSession<S, P>, reader: R, shutdown: F)
where
    S: RegistryStore,
    P: Projection,
    R: AsyncRead + Unpin,
    F: Future<Output = TerminationSignal>,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    tokio::pin!(shutdown);

    while !session.is_terminated() {
        line.clear();
        tokio::select! {
            signal = &mut shutdown => {
                warn!("received {signal}; ending the session");
                session.abort(&format!("received {signal}"));
            }
            read = reader.read_until(b'\n', &mut line) => match read {
                Ok(0) => session.abort("input closed before the commitment was typed"),
                Ok(_) => {
                    let text = String::from_utf8_lossy(trim_line_ending(&line));
                    if session.on_input_changed(&text) == SessionState::Terminated {
                        info!("headless session finished");
                    }
                }
                Err(err) => session.abort(&format!("failed to read input: {err}")),
            },
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
