//! Global shutdown signal for graceful termination.

use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

/// Global cancellation token for Ctrl+C handling. Every network call and
/// subscription observes it; cancelling closes them all.
pub static SHUTDOWN: LazyLock<CancellationToken> = LazyLock::new(CancellationToken::new);
