use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::message::Message;

type RecvFuture<'a> = Pin<Box<dyn Future<Output = Result<Message>> + Send + 'a>>;

/// Stream of received messages, returned by [`Connection::messages`].
///
/// Each item is one [`Connection::recv`]. After a clean close the stream
/// simply ends; if the connection failed, the error is yielded once and
/// the stream ends after it.
pub struct Messages<'a> {
    conn: &'a Connection,
    pending: Option<RecvFuture<'a>>,
    done: bool,
}

impl<'a> Messages<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            pending: None,
            done: false,
        }
    }
}

impl<'a> Stream for Messages<'a> {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let conn = self.conn;
        let fut = self.pending.get_or_insert_with(|| Box::pin(conn.recv()) as RecvFuture<'a>);
        let result = match fut.as_mut().poll(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };
        self.pending = None;

        match result {
            Ok(message) => Poll::Ready(Some(Ok(message))),
            Err(Error::ConnectionClosed(_)) => {
                self.done = true;
                Poll::Ready(None)
            }
            Err(err) => {
                self.done = true;
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}
