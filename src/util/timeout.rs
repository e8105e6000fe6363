//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::BatonError;

/// Run `future` to completion or fail with [`BatonError::Timeout`] once
/// `duration` elapses.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, BatonError>>,
) -> Result<T, BatonError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(BatonError::Timeout(duration.as_millis() as u64)),
    }
}
