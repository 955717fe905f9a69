//! Sending requests with retries.
//!
//! [`Request::send`] performs one or more transport attempts, up to the
//! request's attempt budget. Between attempts a [`RetryPolicy`] decides
//! whether the last outcome is worth repeating, and the executor sleeps with
//! exponential backoff before trying again: the base delay before the first
//! retry, then double that before each following one.
//!
//! When the budget runs out, the last outcome is returned as-is: a received
//! response is returned even if its status is 5xx, and the status is reported
//! by the body accessors.

use std::time::Duration;

use crate::clients::errors::HttpError;
use crate::clients::http_request::Request;
use crate::clients::http_response::Response;

/// Decides whether an attempt should be repeated.
///
/// Called between attempts with the request (whose
/// [`response`](Request::response) holds the attempt's response, if one was
/// received) and the attempt's transport error, if any.
///
/// Returning `None` stops retrying. Returning an error asks for another
/// attempt; the policy may modify the request first, for example to point it
/// at a different path.
///
/// Closures with the matching signature implement this trait:
///
/// ```rust
/// use httpreq::{HttpError, Request};
///
/// let mut request = Request::from_url("https://example.com/flaky");
/// request.set_tries(3).set_retry_policy(
///     |request: &mut Request, error: Option<HttpError>| {
///         match request.response() {
///             Some(response) if response.status().as_u16() == 429 => {
///                 Some(HttpError::retryable("rate limited"))
///             }
///             _ => error,
///         }
///     },
/// );
/// ```
pub trait RetryPolicy: Send + Sync {
    /// Returns the reason to retry, or `None` to stop.
    fn check(&self, request: &mut Request, error: Option<HttpError>) -> Option<HttpError>;
}

impl<F> RetryPolicy for F
where
    F: Fn(&mut Request, Option<HttpError>) -> Option<HttpError> + Send + Sync,
{
    fn check(&self, request: &mut Request, error: Option<HttpError>) -> Option<HttpError> {
        self(request, error)
    }
}

/// The policy used when a request has none: retry transport errors and 5xx
/// responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn check(&self, request: &mut Request, error: Option<HttpError>) -> Option<HttpError> {
        if error.is_some() {
            return error;
        }
        request
            .response()
            .filter(|response| response.status().is_server_error())
            .and_then(Response::status_error)
            .map(HttpError::from)
    }
}

/// Returns the sleep before the `retry`-th retry of one send call (1-based).
#[must_use]
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    base.saturating_mul(factor)
}

impl Request {
    /// Sends the request, retrying per its policy and attempt budget.
    ///
    /// Any previous response is dropped and the attempt counter restarts at
    /// zero. Returns the response of the last attempt, whatever its status.
    ///
    /// # Errors
    ///
    /// - the first construction error recorded on the request, without any
    ///   network traffic; an error recorded by the retry policy between
    ///   attempts stops the send before the next attempt
    /// - [`HttpError::Transport`] if the last attempt failed in transport
    /// - [`HttpError::MissingResponse`] if the policy stopped after a failed
    ///   attempt
    pub async fn send(&mut self) -> Result<&mut Response, HttpError> {
        self.response = None;
        self.attempt = 0;
        self.resend().await
    }

    /// Sends the request again without resetting the attempt counter.
    ///
    /// Attempts continue the numbering of the previous send and count against
    /// the same budget, but at least one attempt is always made. The backoff
    /// starts again at the base delay.
    ///
    /// # Errors
    ///
    /// Same as [`Request::send`].
    pub async fn resend(&mut self) -> Result<&mut Response, HttpError> {
        let mut retry: u32 = 0;
        loop {
            if let Some(error) = &self.error {
                return Err(error.clone().into());
            }
            self.attempt += 1;
            let outcome = self.attempt_once().await.err();

            if self.attempt >= self.tries.max(1) {
                if let Some(error) = outcome {
                    return Err(error);
                }
                break;
            }

            let policy = self.retry_policy.clone();
            let verdict = match policy {
                Some(policy) => policy.check(self, outcome),
                None => DefaultRetryPolicy.check(self, outcome),
            };
            let Some(reason) = verdict else {
                tracing::debug!(attempt = self.attempt, "retry policy accepted outcome");
                break;
            };
            if self.error.is_some() {
                // the policy's changes failed; report them without waiting
                continue;
            }

            retry += 1;
            let delay = backoff_delay(self.retry_delay, retry);
            tracing::warn!(
                attempt = self.attempt,
                tries = self.tries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason = %reason,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        self.response
            .as_mut()
            .ok_or(HttpError::MissingResponse(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::{BuildError, ErrorKind};
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    fn with_response(status: u16) -> Request {
        let mut request = Request::from_url("http://localhost/");
        request.response = Some(Response::from_parts(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            "",
        ));
        request
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_saturates() {
        assert_eq!(
            backoff_delay(Duration::from_secs(1), 200),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }

    #[test]
    fn test_default_policy_retries_server_errors() {
        let mut request = with_response(503);
        let verdict = DefaultRetryPolicy.check(&mut request, None).unwrap();
        assert_eq!(verdict.kind(), ErrorKind::Status);
        assert_eq!(verdict.status().map(|e| e.code), Some(503));
    }

    #[test]
    fn test_default_policy_accepts_client_errors() {
        let mut request = with_response(404);
        assert!(DefaultRetryPolicy.check(&mut request, None).is_none());

        let mut request = with_response(200);
        assert!(DefaultRetryPolicy.check(&mut request, None).is_none());
    }

    #[test]
    fn test_default_policy_keeps_transport_error() {
        let mut request = Request::new();
        let verdict = DefaultRetryPolicy.check(&mut request, Some(HttpError::retryable("reset")));
        assert_eq!(verdict.map(|e| e.kind()), Some(ErrorKind::Retryable));
    }

    #[test]
    fn test_closure_policy_can_modify_request() {
        let policy = |request: &mut Request, _error: Option<HttpError>| -> Option<HttpError> {
            request.add_url("/status/404");
            None
        };
        let mut request = Request::from_url("http://localhost/status/500");
        assert!(policy.check(&mut request, None).is_none());
        assert_eq!(
            request.url().map(ToString::to_string).as_deref(),
            Some("http://localhost/status/404")
        );
    }

    #[tokio::test]
    async fn test_send_reports_deferred_error_without_attempting() {
        let mut request = Request::from_url("http://localhost/%zz");
        let error = request.send().await.unwrap_err();

        assert!(matches!(
            error,
            HttpError::Build(BuildError::MalformedReference { .. })
        ));
        assert_eq!(request.attempt(), 0);
        assert!(request.response().is_none());
    }

    #[tokio::test]
    async fn test_resend_reports_error_recorded_after_attempts() {
        let mut request = Request::from_url("http://localhost/");
        request.attempt = 2;
        request.add_url("bad%zz");

        let error = request.resend().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedReference);
        assert_eq!(request.attempt(), 2);
    }

    #[test]
    fn test_policy_is_object_safe() {
        let policies: Vec<Box<dyn RetryPolicy>> = vec![
            Box::new(DefaultRetryPolicy),
            Box::new(|_: &mut Request, error: Option<HttpError>| error),
        ];
        assert_eq!(policies.len(), 2);
    }
}
