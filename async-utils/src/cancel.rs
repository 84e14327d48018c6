use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Returned when the token fires before the future resolves.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Lets any `Send` future be abandoned through a `CancellationToken`.
///
/// The debounce timer uses this to drop a pending window as soon as a newer
/// value (or an explicit flush) supersedes it.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Resolve with the future's output, or `CancelErr::Cancelled` if the
    /// token is (or already was) cancelled first.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }
}
