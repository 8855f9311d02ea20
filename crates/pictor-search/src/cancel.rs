//! Cancellation helpers.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use pictor_core::{Error, Result};

/// Run `fut` unless `cancel` fires first, in which case `fut` is dropped
/// and `Error::Cancelled` is returned.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
