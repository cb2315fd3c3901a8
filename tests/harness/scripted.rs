//! A frame transport scripted by the test.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use wsduplex::protocol::{Frame, OpCode};
use wsduplex::{Error, FrameRead, FrameTransport, FrameWrite, Result};

use super::WAIT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Frame(Frame),
    Flush,
    Shutdown,
}

struct Wire {
    events: Mutex<Vec<Event>>,
    reads: AtomicUsize,
    reader_dropped: AtomicBool,
    writer_dropped: AtomicBool,
    open: watch::Sender<bool>,
    write_error: Mutex<Option<ErrorKind>>,
}

/// Test-side handle: feeds the reader and inspects the writer.
#[derive(Clone)]
pub struct Script {
    incoming: mpsc::UnboundedSender<Result<Frame>>,
    wire: Arc<Wire>,
}

pub struct ScriptedTransport {
    incoming: mpsc::UnboundedReceiver<Result<Frame>>,
    wire: Arc<Wire>,
}

pub struct ScriptedReader {
    incoming: mpsc::UnboundedReceiver<Result<Frame>>,
    wire: Arc<Wire>,
}

pub struct ScriptedWriter {
    wire: Arc<Wire>,
}

pub fn transport() -> (ScriptedTransport, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (open, _) = watch::channel(true);
    let wire = Arc::new(Wire {
        events: Mutex::new(Vec::new()),
        reads: AtomicUsize::new(0),
        reader_dropped: AtomicBool::new(false),
        writer_dropped: AtomicBool::new(false),
        open,
        write_error: Mutex::new(None),
    });
    (
        ScriptedTransport {
            incoming: rx,
            wire: Arc::clone(&wire),
        },
        Script { incoming: tx, wire },
    )
}

impl FrameTransport for ScriptedTransport {
    type Reader = ScriptedReader;
    type Writer = ScriptedWriter;

    fn split(self) -> (ScriptedReader, ScriptedWriter) {
        (
            ScriptedReader {
                incoming: self.incoming,
                wire: Arc::clone(&self.wire),
            },
            ScriptedWriter { wire: self.wire },
        )
    }
}

impl FrameRead for ScriptedReader {
    async fn read_frame(&mut self) -> Result<Frame> {
        match self.incoming.recv().await {
            Some(result) => {
                self.wire.reads.fetch_add(1, Ordering::SeqCst);
                result
            }
            None => Err(Error::io(ErrorKind::UnexpectedEof, "script ended")),
        }
    }
}

impl Drop for ScriptedReader {
    fn drop(&mut self) {
        self.wire.reader_dropped.store(true, Ordering::SeqCst);
    }
}

impl Drop for ScriptedWriter {
    fn drop(&mut self) {
        self.wire.writer_dropped.store(true, Ordering::SeqCst);
    }
}

impl ScriptedWriter {
    async fn gate(&self) -> Result<()> {
        let mut open = self.wire.open.subscribe();
        let _ = open.wait_for(|open| *open).await;
        match *self.wire.write_error.lock().unwrap() {
            Some(kind) => Err(Error::io(kind, "scripted write failure")),
            None => Ok(()),
        }
    }

    fn record(&self, event: Event) {
        self.wire.events.lock().unwrap().push(event);
    }
}

impl FrameWrite for ScriptedWriter {
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.gate().await?;
        self.record(Event::Frame(frame.clone()));
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.gate().await?;
        self.record(Event::Flush);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.record(Event::Shutdown);
        Ok(())
    }
}

impl Script {
    pub fn push(&self, frame: Frame) {
        self.incoming.send(Ok(frame)).unwrap();
    }

    pub fn push_text(&self, text: &str) {
        self.push(Frame::text(text));
    }

    pub fn push_error(&self, kind: ErrorKind) {
        self.incoming
            .send(Err(Error::io(kind, "scripted read failure")))
            .unwrap();
    }

    /// Block the writer inside its next write or flush.
    pub fn stall(&self) {
        self.wire.open.send_replace(false);
    }

    pub fn resume(&self) {
        self.wire.open.send_replace(true);
    }

    /// Fail every write from now on.
    pub fn fail_writes(&self, kind: ErrorKind) {
        *self.wire.write_error.lock().unwrap() = Some(kind);
    }

    /// Frames consumed by the reader so far, errors included.
    pub fn reads(&self) -> usize {
        self.wire.reads.load(Ordering::SeqCst)
    }

    /// Both transport halves have been dropped.
    pub fn released(&self) -> bool {
        self.wire.reader_dropped.load(Ordering::SeqCst)
            && self.wire.writer_dropped.load(Ordering::SeqCst)
    }

    /// Wait until both transport halves have been dropped.
    pub async fn wait_released(&self) {
        tokio::time::timeout(WAIT, async {
            while !self.released() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("transport was never released");
    }

    pub fn events(&self) -> Vec<Event> {
        self.wire.events.lock().unwrap().clone()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Frame(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Flush))
            .count()
    }

    /// Data frames written so far (control frames excluded).
    pub fn data_frames(&self) -> Vec<Frame> {
        self.frames()
            .into_iter()
            .filter(|frame| frame.opcode.is_data())
            .collect()
    }

    /// Wait until at least `count` frames have been written.
    pub async fn wait_for_frames(&self, count: usize) -> Vec<Frame> {
        tokio::time::timeout(WAIT, async {
            loop {
                let frames = self.frames();
                if frames.len() >= count {
                    return frames;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} frames, got {:?}", self.frames()))
    }

    /// Wait until a Close frame has been written and return its payload.
    pub async fn wait_for_close(&self) -> Vec<u8> {
        tokio::time::timeout(WAIT, async {
            loop {
                if let Some(close) = self
                    .frames()
                    .into_iter()
                    .find(|frame| frame.opcode == OpCode::Close)
                {
                    return close.into_payload();
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("no close frame written")
    }
}
