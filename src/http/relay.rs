//! Frame-by-frame body relay.
//!
//! A [`RelayBody`] wraps one body (the inbound request body or the upstream
//! response body) and hands each frame on unmodified, in order, holding at
//! most the frame currently being yielded.
//!
//! # States
//! ```text
//! Open ──(source ends)──▶ Closed
//!   │
//!   └──(source errors)──▶ Errored
//! ```
//! Transitions are one-way. The source has ended either when it yields `None`
//! or when it reports `is_end_stream()` after a frame; a server that knows the
//! content length stops polling at that point. A relay dropped while still
//! `Open` was canceled by its consumer; the source is dropped with it, which
//! aborts the underlying transfer.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};

/// Which leg of the exchange a relay carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Inbound request body, flowing to the upstream.
    Request,
    /// Upstream response body, flowing back to the caller.
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => write!(f, "request"),
            Direction::Response => write!(f, "response"),
        }
    }
}

/// Lifecycle of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Source may still yield frames.
    Open,
    /// Source reached end-of-stream.
    Closed,
    /// Source failed; the error was passed on once.
    Errored,
}

/// Body adapter relaying frames from `source` one at a time.
pub struct RelayBody<B> {
    source: B,
    direction: Direction,
    state: RelayState,
    relayed_bytes: u64,
}

impl<B> RelayBody<B> {
    pub fn new(source: B, direction: Direction) -> Self {
        Self {
            source,
            direction,
            state: RelayState::Open,
            relayed_bytes: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn relayed_bytes(&self) -> u64 {
        self.relayed_bytes
    }

    fn close(&mut self) {
        self.state = RelayState::Closed;
        tracing::trace!(
            direction = %self.direction,
            relayed_bytes = self.relayed_bytes,
            "Body stream closed"
        );
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: fmt::Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.state != RelayState::Open {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.source).poll_frame(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(chunk) = frame.data_ref() {
                    self.relayed_bytes += chunk.len() as u64;
                }
                if self.source.is_end_stream() {
                    self.close();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.state = RelayState::Errored;
                tracing::warn!(
                    direction = %self.direction,
                    relayed_bytes = self.relayed_bytes,
                    error = %e,
                    "Body stream errored"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.close();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.state != RelayState::Open || self.source.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        match self.state {
            RelayState::Open => self.source.size_hint(),
            _ => SizeHint::with_exact(0),
        }
    }
}

impl<B> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if self.state == RelayState::Open {
            tracing::warn!(
                direction = %self.direction,
                relayed_bytes = self.relayed_bytes,
                reason = "consumer dropped the stream before end-of-stream",
                "Body stream canceled"
            );
        }
    }
}

impl<B> fmt::Debug for RelayBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBody")
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("relayed_bytes", &self.relayed_bytes)
            .finish()
    }
}
