use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};

use super::file_source::Command;
use super::resource::Response;
use crate::archive::RequestId;
use crate::error::ArchiveError;

/// Cancellable handle to an outstanding request.
///
/// Await it for the result. Dropping it before completion cancels the
/// request: the fetch it waits on is aborted and no result is produced.
#[must_use = "dropping a RequestHandle cancels the request"]
pub struct RequestHandle {
    id: RequestId,
    reply: oneshot::Receiver<Result<Response, ArchiveError>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl RequestHandle {
    pub(crate) fn new(
        id: RequestId,
        reply: oneshot::Receiver<Result<Response, ArchiveError>>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { id, reply, commands }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Cancel the request. Same as dropping the handle.
    pub fn cancel(self) {}
}

impl Future for RequestHandle {
    type Output = Result<Response, ArchiveError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.reply)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ArchiveError::SessionClosed)))
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        // The worker may already be gone; nothing left to cancel then
        let _ = self.commands.send(Command::Cancel(self.id));
    }
}
