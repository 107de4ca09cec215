//! Recovery from stale cache entries: invalidate, then try exactly once more.

use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use backon::{ConstantBuilder, Retryable};
use tokio::time::sleep;
use tracing::warn;

use crate::error::{OtlError, OtlResult};

/// Runs `op`; if it fails with an error `is_stale` accepts, awaits `invalidate`
/// and runs `op` a second time. The second outcome is returned as is.
pub async fn retry_once_after_invalidate<T, Op, OpFut, Inv, InvFut, Stale>(
    stage: &'static str,
    is_stale: Stale,
    invalidate: Inv,
    op: Op,
) -> OtlResult<T>
where
    Op: Fn() -> OpFut,
    OpFut: Future<Output = OtlResult<T>>,
    Inv: Fn() -> InvFut,
    InvFut: Future<Output = ()>,
    Stale: Fn(&OtlError) -> bool,
{
    let attempts = AtomicUsize::new(0);
    let (op, invalidate, attempts) = (&op, &invalidate, &attempts);

    let attempt = move || async move {
        if attempts.fetch_add(1, Ordering::SeqCst) > 0 {
            invalidate().await;
        }
        op().await
    };

    let once = ConstantBuilder::default()
        .with_delay(Duration::ZERO)
        .with_max_times(1);

    attempt
        .retry(once)
        .sleep(sleep)
        .when(is_stale)
        .notify(|err: &OtlError, _: Duration| {
            warn!(
                stage,
                error = %err,
                "stale cache entry suspected; invalidating and retrying once"
            );
        })
        .await
}
