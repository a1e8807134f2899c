use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep, sleep};

pin_project! {
    /// Fails a read with [`TimedOut`](io::ErrorKind::TimedOut) when the inner
    /// reader makes no progress for `idle`.
    ///
    /// The deadline is pushed back every time a read completes, so a slow but
    /// steady transfer is never cut off.
    pub struct IdleTimeoutReader<R> {
        #[pin]
        inner: R,
        #[pin]
        deadline: Sleep,
        idle: Duration,
    }
}
impl<R: AsyncRead> IdleTimeoutReader<R> {
    pub fn new(inner: R, idle: Duration) -> Self {
        Self { inner, deadline: sleep(idle), idle }
    }
}
impl<R: AsyncRead> AsyncRead for IdleTimeoutReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let mut this = self.project();
        match this.inner.poll_read(cx, buf) {
            Poll::Ready(result) => {
                let next = Instant::now() + *this.idle;
                this.deadline.as_mut().reset(next);
                Poll::Ready(result)
            },
            Poll::Pending => match this.deadline.poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data received for {}ms", this.idle.as_millis()),
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_passes_data_through() {
        let mut reader = std::pin::pin!(IdleTimeoutReader::new(&b"hello"[..], Duration::from_secs(1)));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_stalled_reader_times_out() {
        // The write half is kept alive but never written to.
        let (_writer, stalled) = tokio::io::duplex(64);
        let mut reader = std::pin::pin!(IdleTimeoutReader::new(stalled, Duration::from_millis(10)));
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
