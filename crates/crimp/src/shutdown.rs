// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown: ctrl-c flips one cancellation token shared by every
//! loop in the process.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Install the signal handler and return the token it cancels.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            cancel.cancel();
        }
    });
    token
}
