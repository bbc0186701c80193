// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Polling of asynchronous OCI work requests.
//!
//! Cancellation is by dropping the returned future; the loop never holds a
//! poll interval longer than one sleep.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::constants::poll::{SYNCHRONOUS_API_CALL_TIMEOUT, SYNCHRONOUS_API_POLL_TIMEOUT};
use crate::error::{OciError, Result};
use crate::oci::generic::{GenericWorkRequest, WorkRequestStatus};

/// Poll `get` every `interval` until the work request reaches a terminal state.
///
/// Each poll runs under [`SYNCHRONOUS_API_CALL_TIMEOUT`]. Retryable failures
/// (including a poll that times out) are logged and polling continues. Any
/// other failure is returned, wrapped with the opc-request-id of the failed
/// call, or a client generated id when the service did not provide one.
#[instrument(skip(get, interval), fields(trace_id = tracing::field::Empty))]
pub async fn await_work_request<F, Fut>(
    id: &str,
    interval: Duration,
    mut get: F,
) -> Result<GenericWorkRequest>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<GenericWorkRequest>>,
{
    let trace_id = Uuid::new_v4().to_string();
    tracing::Span::current().record("trace_id", trace_id.as_str());

    loop {
        let polled = tokio::time::timeout(SYNCHRONOUS_API_CALL_TIMEOUT, get())
            .await
            .unwrap_or(Err(OciError::DeadlineExceeded));

        match polled {
            Ok(wr) => match wr.status {
                WorkRequestStatus::Succeeded => {
                    info!("WorkRequest {:?} succeeded", id);
                    return Ok(wr);
                }
                WorkRequestStatus::Failed | WorkRequestStatus::Canceled => {
                    return Err(OciError::WorkRequestFailed {
                        id: id.to_string(),
                        message: wr.message,
                    });
                }
                status => debug!("WorkRequest {:?} is {:?}, polling again", id, status),
            },
            Err(e) if e.is_retryable() => {
                debug!("Retryable error polling WorkRequest {:?}: {}", id, e);
            }
            Err(e) => {
                let request_id = e
                    .opc_request_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| trace_id.clone());
                return Err(e.wrap(format!(
                    "failed to get WorkRequest {:?} (opc-request-id: {})",
                    id, request_id
                )));
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// [`await_work_request`] bounded by [`SYNCHRONOUS_API_POLL_TIMEOUT`] overall.
pub async fn await_work_request_bounded<F, Fut>(
    id: &str,
    interval: Duration,
    get: F,
) -> Result<GenericWorkRequest>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<GenericWorkRequest>>,
{
    tokio::time::timeout(SYNCHRONOUS_API_POLL_TIMEOUT, await_work_request(id, interval, get))
        .await
        .map_err(|_| OciError::DeadlineExceeded.wrap(format!("awaiting WorkRequest {:?}", id)))?
}

/// Run `check` every `interval` until it yields a value or fails.
pub(crate) async fn poll_until<T, F, Fut>(interval: Duration, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        tokio::time::sleep(interval).await;
    }
}

/// [`poll_until`] giving up after `timeout`.
pub(crate) async fn poll_until_timeout<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    tokio::time::timeout(timeout, poll_until(interval, check))
        .await
        .map_err(|_| OciError::DeadlineExceeded.wrap("timed out waiting for the condition"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn make_wr(status: WorkRequestStatus, message: &str) -> GenericWorkRequest {
        GenericWorkRequest {
            id: "ocid1.wr".to_string(),
            load_balancer_id: "ocid1.lb".to_string(),
            status,
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn scripted(
        script: Vec<Result<GenericWorkRequest>>,
    ) -> (Mutex<VecDeque<Result<GenericWorkRequest>>>, AtomicU32) {
        (Mutex::new(script.into()), AtomicU32::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_in_progress() {
        let (script, calls) = scripted(vec![
            Ok(make_wr(WorkRequestStatus::InProgress, "")),
            Ok(make_wr(WorkRequestStatus::InProgress, "")),
            Ok(make_wr(WorkRequestStatus::Succeeded, "")),
        ]);

        let wr = await_work_request("ocid1.wr", INTERVAL, || {
            calls.fetch_add(1, Ordering::SeqCst);
            let next = script.lock().unwrap().pop_front().unwrap();
            async move { next }
        })
        .await
        .unwrap();

        assert_eq!(wr.load_balancer_id, "ocid1.lb");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_carries_id_and_message() {
        let err = await_work_request("ocid1.wr", INTERVAL, || async {
            Ok(make_wr(WorkRequestStatus::Failed, "M"))
        })
        .await
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("ocid1.wr"), "{}", msg);
        assert!(msg.contains('M'), "{}", msg);
        assert!(matches!(err, OciError::WorkRequestFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_polling() {
        let calls = AtomicU32::new(0);
        let err = await_work_request("ocid1.wr", INTERVAL, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(OciError::Service(
                    ServiceError::new(400, "InvalidParameter", "bad").with_request_id("req-9"),
                ))
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.to_string().contains("req-9"));
        assert_eq!(err.service_error().unwrap().code, "InvalidParameter");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_without_request_id_gets_generated_one() {
        let err = await_work_request("ocid1.wr", INTERVAL, || async {
            Err(OciError::fatal("boom"))
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("opc-request-id: "));
        assert!(!err.to_string().contains("opc-request-id: )"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_keep_polling() {
        let (script, _) = scripted(vec![
            Err(OciError::Service(ServiceError::new(429, "TooManyRequests", "slow"))),
            Err(OciError::DeadlineExceeded),
            Ok(make_wr(WorkRequestStatus::Succeeded, "")),
        ]);

        let wr = await_work_request("ocid1.wr", INTERVAL, || {
            let next = script.lock().unwrap().pop_front().unwrap();
            async move { next }
        })
        .await;

        assert!(wr.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_future_stops_polling() {
        let calls = AtomicU32::new(0);
        let result = tokio::time::timeout(
            Duration::from_secs(7),
            await_work_request("ocid1.wr", INTERVAL, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(make_wr(WorkRequestStatus::InProgress, "")) }
            }),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_wait_gives_up() {
        let err = await_work_request_bounded("ocid1.wr", INTERVAL, || async {
            Ok(make_wr(WorkRequestStatus::InProgress, ""))
        })
        .await
        .unwrap_err();

        assert!(matches!(err.root(), OciError::DeadlineExceeded));
    }
}
