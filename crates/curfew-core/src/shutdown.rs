//! Process termination signals that must route through session cleanup.
//!
//! Handlers are registered when a [`TerminationListener`] is installed, not
//! when it is first awaited. Install one before the restriction is applied so
//! that no signal can take the default disposition while the task manager is
//! disabled.

use log::{debug, warn};
use std::fmt;
use std::io;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    CtrlC,
    Terminate,
    ConsoleClose,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationSignal::CtrlC => "ctrl-c",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::ConsoleClose => "console close",
        })
    }
}

/// Signal handlers that are already armed.
///
/// Signals delivered between [`install`](Self::install) and the first
/// [`recv`](Self::recv) are buffered and reported by that call.
#[derive(Debug)]
pub struct TerminationListener {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
    #[cfg(windows)]
    close: tokio::signal::windows::CtrlClose,
}

impl TerminationListener {
    /// Register the handlers now. Must be called within a Tokio runtime context,
    /// and that runtime must keep running for signals to be observed.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let listener = Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        };
        debug!("SIGINT and SIGTERM handlers installed");
        Ok(listener)
    }

    #[cfg(windows)]
    pub fn install() -> io::Result<Self> {
        let listener = Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
            close: tokio::signal::windows::ctrl_close()?,
        };
        debug!("ctrl-c and console close handlers installed");
        Ok(listener)
    }

    #[cfg(not(any(unix, windows)))]
    pub fn install() -> io::Result<Self> {
        warn!("no termination signals are available on this platform");
        Ok(Self {})
    }

    /// Resolve with the next termination request. Never resolves spuriously.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => TerminationSignal::CtrlC,
            Some(()) = self.terminate.recv() => TerminationSignal::Terminate,
            else => {
                warn!("signal driver stopped; termination signals are no longer observed");
                std::future::pending().await
            }
        }
    }

    #[cfg(windows)]
    pub async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            Some(()) = self.ctrl_c.recv() => TerminationSignal::CtrlC,
            Some(()) = self.close.recv() => TerminationSignal::ConsoleClose,
            else => {
                warn!("signal driver stopped; termination signals are no longer observed");
                std::future::pending().await
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    pub async fn recv(&mut self) -> TerminationSignal {
        std::future::pending().await
    }
}

/// Receiving side of a [`TerminationWatch`]; holds `Some` once a signal arrived.
pub type SignalReceiver = watch::Receiver<Option<TerminationSignal>>;

/// A listener armed on its own background runtime.
///
/// For front ends whose event loop is not a Tokio runtime the caller controls.
/// The first signal is published to every [`SignalReceiver`], including ones
/// subscribed after it arrived.
#[derive(Debug)]
pub struct TerminationWatch {
    receiver: SignalReceiver,
    // Keeps the signal driver running.
    _runtime: Runtime,
}

impl TerminationWatch {
    /// Start the background runtime and install the handlers before returning.
    ///
    /// Must not be called from within an async context.
    pub fn spawn() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("curfew-signals")
            .enable_all()
            .build()?;
        let mut listener = {
            let _context = runtime.enter();
            TerminationListener::install()?
        };

        let (sender, receiver) = watch::channel(None);
        runtime.spawn(async move {
            let signal = listener.recv().await;
            debug!("publishing {signal}");
            // Every receiver may already be gone during shutdown.
            let _ = sender.send(Some(signal));
        });

        Ok(Self {
            receiver,
            _runtime: runtime,
        })
    }

    pub fn subscribe(&self) -> SignalReceiver {
        self.receiver.clone()
    }
}

/// Wait until `receiver` reports a signal. Works on any executor.
pub async fn next_signal(receiver: &mut SignalReceiver) -> TerminationSignal {
    let observed = receiver
        .wait_for(Option::is_some)
        .await
        .map(|signal| (*signal).unwrap_or(TerminationSignal::Terminate));
    match observed {
        Ok(signal) => signal,
        Err(_) => {
            warn!("termination watch closed; termination signals are no longer observed");
            std::future::pending().await
        }
    }
}
