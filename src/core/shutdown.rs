//! # Termination signals for [`Worker::serve`](crate::Worker::serve).
//!
//! | Platform | Signals                          |
//! |----------|----------------------------------|
//! | unix     | `SIGINT`, `SIGTERM`, `SIGQUIT`   |
//! | other    | Ctrl-C                           |

use std::io;

/// Completes on the first termination signal and returns its name.
///
/// Fails only when a listener cannot be registered.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
