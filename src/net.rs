//! Shared plumbing for outbound provider calls.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

/// Pause before the single retry granted to transient failures.
pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Run `op`, retrying exactly once (after a short backoff) if it fails
/// with a transient transport error. Security and protocol failures are
/// never retried here; they surface from the response itself.
pub(crate) async fn retry_once<T, F, Fut>(op: F) -> Result<T, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            tracing::debug!(error = %e, "transient provider error, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            op().await
        }
        other => other,
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// GET `url` and decode the JSON body, with the standard timeout and
/// single-retry policy.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<T, reqwest::Error> {
    let response = retry_once(|| http.get(url.clone()).timeout(timeout).send()).await?;
    response.error_for_status()?.json::<T>().await
}

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}
