use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use hyp_drive::ByteStream;
use tracing::debug;

/// Lifecycle of a [`StreamAdapter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has been pulled from the inner stream yet.
    NotStarted,
    /// Pulling; no chunk is waiting for a listener.
    Buffering,
    /// A chunk arrived while no readable listener was attached. The next
    /// listener to attach is notified at once.
    ReadablePending,
    /// The inner stream ran to completion.
    Ended,
    /// Torn down before completion.
    Destroyed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Destroyed)
    }
}

type Listener = Box<dyn FnMut() + Send>;
type Callback = Box<dyn FnOnce() + Send>;

/// Wraps a lazy byte stream and guarantees one release per stream.
///
/// The release callback usually owns a [`DriveLease`](hyp_drive::DriveLease),
/// so the drive is checked in exactly once whether the consumer drains the
/// stream, destroys it, detaches early or just drops it.
///
/// Consumers either poll it as a [`Stream`] or use the listener API:
/// [`on_readable`](Self::on_readable) / [`on_end`](Self::on_end) together
/// with [`fill`](Self::fill) and [`read`](Self::read).
///
/// Transitions:
///
/// | from                  | event                          | to                |
/// |-----------------------|--------------------------------|-------------------|
/// | NotStarted            | first pull                     | Buffering         |
/// | Buffering             | chunk, no readable listener    | ReadablePending   |
/// | ReadablePending       | readable listener attached     | Buffering         |
/// | NotStarted, Buffering | inner stream exhausted         | Ended             |
/// | any non-terminal      | destroy, drop, end listener detached, inner error | Destroyed |
pub struct StreamAdapter {
    inner: Option<ByteStream>,
    phase: Phase,
    buffered: Option<Bytes>,
    error: Option<io::Error>,
    readable_fired: bool,
    on_readable: Option<Listener>,
    on_end: Option<Callback>,
    release: Option<Callback>,
}

impl StreamAdapter {
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner: Some(inner),
            phase: Phase::NotStarted,
            buffered: None,
            error: None,
            readable_fired: false,
            on_readable: None,
            on_end: None,
            release: None,
        }
    }

    /// Run `release` once, when the stream ends or is destroyed.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attach the readable listener, replacing any previous one.
    ///
    /// Fires immediately if a notification is pending or has fired before.
    pub fn on_readable(&mut self, listener: impl FnMut() + Send + 'static) {
        let mut listener: Listener = Box::new(listener);
        if self.phase == Phase::ReadablePending {
            self.phase = Phase::Buffering;
            self.readable_fired = true;
            listener();
        } else if self.readable_fired {
            listener();
        }
        self.on_readable = Some(listener);
    }

    pub fn remove_readable(&mut self) {
        self.on_readable = None;
    }

    /// Attach the end listener. Fires immediately if the stream has already
    /// ended; never fires after destruction.
    pub fn on_end(&mut self, listener: impl FnOnce() + Send + 'static) {
        match self.phase {
            Phase::Ended => listener(),
            Phase::Destroyed => {}
            _ => self.on_end = Some(Box::new(listener)),
        }
    }

    /// Detach the end listener.
    ///
    /// Detaching before the stream ended abandons it: the stream is
    /// destroyed and released. After the end this is plain cleanup.
    pub fn remove_end(&mut self) {
        if self.on_end.take().is_some() {
            self.destroy();
        }
    }

    /// Wait until a chunk is buffered (`true`) or the stream is over (`false`).
    pub async fn fill(&mut self) -> bool {
        futures::future::poll_fn(|cx| self.poll_fill(cx)).await
    }

    /// Take the buffered chunk, pulling once from the inner stream if none is
    /// buffered. Never waits; use [`fill`](Self::fill) for that.
    pub fn read(&mut self) -> Option<Bytes> {
        if self.buffered.is_none() {
            let mut cx = Context::from_waker(futures::task::noop_waker_ref());
            if !matches!(self.poll_fill(&mut cx), Poll::Ready(true)) {
                return None;
            }
        }
        self.take_buffered()
    }

    /// Error that ended the stream, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Tear the stream down and release it. Only the first call has effect;
    /// pending errors are discarded.
    pub fn destroy(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = Phase::Destroyed;
        self.inner = None;
        self.buffered = None;
        self.error = None;
        self.on_end = None;
        self.run_release();
    }

    /// Drain the rest of the stream into one buffer.
    pub async fn read_to_end(mut self) -> io::Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }

    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        if self.buffered.is_some() {
            return Poll::Ready(true);
        }
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(false);
        };
        if self.phase == Phase::NotStarted {
            self.phase = Phase::Buffering;
        }

        match inner.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                self.buffered = Some(chunk);
                self.notify_readable();
                Poll::Ready(true)
            }
            Poll::Ready(Some(Err(e))) => {
                debug!(error = %e, "stream failed");
                self.destroy();
                self.error = Some(e);
                Poll::Ready(false)
            }
            Poll::Ready(None) => {
                self.finish();
                Poll::Ready(false)
            }
        }
    }

    fn notify_readable(&mut self) {
        match self.on_readable.as_mut() {
            Some(listener) => {
                self.readable_fired = true;
                listener();
            }
            None => self.phase = Phase::ReadablePending,
        }
    }

    fn take_buffered(&mut self) -> Option<Bytes> {
        if self.phase == Phase::ReadablePending {
            self.phase = Phase::Buffering;
        }
        self.buffered.take()
    }

    fn finish(&mut self) {
        self.phase = Phase::Ended;
        self.inner = None;
        if let Some(listener) = self.on_end.take() {
            listener();
        }
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Stream for StreamAdapter {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.buffered.is_some() {
            return Poll::Ready(this.take_buffered().map(Ok));
        }
        match this.poll_fill(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(true) => Poll::Ready(this.take_buffered().map(Ok)),
            Poll::Ready(false) => Poll::Ready(this.error.take().map(Err)),
        }
    }
}

impl Drop for StreamAdapter {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for StreamAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("phase", &self.phase)
            .field("released", &self.release.is_none())
            .finish()
    }
}
