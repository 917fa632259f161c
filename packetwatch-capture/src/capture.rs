//! Capture sessions over pluggable backends.
//!
//! A [`CaptureBackend`] knows which interfaces exist and how to open one; the
//! resulting [`PacketSource`] yields frames one read at a time, each read
//! bounded by the configured read timeout. [`CaptureSession`] owns a source,
//! decodes frames into [`RawPacket`]s and groups them into batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use packetwatch_config::CaptureConfig;
use tracing::{debug, trace, warn};

use crate::decode::decode;
use crate::error::CaptureError;
use crate::packet::{Frame, RawPacket};

/// Outcome of a single bounded read.
#[derive(Debug)]
pub enum FrameRead {
    Frame(Frame),
    /// Nothing arrived within the read timeout.
    Timeout,
    /// The source has no more frames (end of a capture file).
    Exhausted,
}

/// An open capture handle. Dropping it releases the underlying device.
pub trait PacketSource: Send {
    /// Blocks for at most the configured read timeout.
    fn next_frame(&mut self) -> Result<FrameRead, CaptureError>;
}

/// Device enumeration and opening.
pub trait CaptureBackend: Send + Sync {
    /// Names of the interfaces this backend can open.
    fn interface_names(&self) -> Result<Vec<String>, CaptureError>;

    fn open(
        &self,
        interface: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn PacketSource>, CaptureError>;
}

/// Cross-thread close request for a [`CaptureSession`].
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    /// Makes an in-progress `next_batch` return at its next read boundary.
    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Packets read by one `next_batch` call.
#[derive(Debug, Default)]
pub struct CapturedBatch {
    /// Decoded packets in capture order.
    pub packets: Vec<RawPacket>,
    /// Frames skipped because they did not decode.
    pub skipped: u64,
}

/// Exclusive owner of one open packet source.
pub struct CaptureSession {
    interface: String,
    source: Option<Box<dyn PacketSource>>,
    close: CloseHandle,
    exhausted: bool,
    pending_error: Option<CaptureError>,
}

impl CaptureSession {
    /// Opens `interface` on `backend`.
    pub fn open(
        backend: &dyn CaptureBackend,
        interface: &str,
        config: &CaptureConfig,
    ) -> Result<Self, CaptureError> {
        let source = backend.open(interface, config)?;
        debug!(interface, "capture session opened");
        Ok(Self {
            interface: interface.to_string(),
            source: Some(source),
            close: CloseHandle::default(),
            exhausted: false,
            pending_error: None,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// True once the source reported end of stream or the session was closed.
    pub fn is_finished(&self) -> bool {
        self.exhausted || self.source.is_none() || self.close.is_closed()
    }

    /// Reads until `max_count` packets are decoded, the session is closed or
    /// the source is exhausted, and returns what was collected.
    ///
    /// A read error after some packets were collected is held back and
    /// returned by the next call, so the collected packets are not lost.
    pub fn next_batch(&mut self, max_count: usize) -> Result<CapturedBatch, CaptureError> {
        if let Some(error) = self.pending_error.take() {
            return Err(error);
        }

        let mut batch = CapturedBatch {
            packets: Vec::with_capacity(max_count),
            skipped: 0,
        };

        while batch.packets.len() < max_count && !self.close.is_closed() && !self.exhausted {
            let Some(source) = self.source.as_mut() else {
                break;
            };

            match source.next_frame() {
                Ok(FrameRead::Frame(frame)) => match decode(&frame) {
                    Ok(packet) => {
                        trace!(length = packet.length, protocol = %packet.protocol, "packet decoded");
                        batch.packets.push(packet);
                    }
                    Err(e) => {
                        trace!(error = %e, "skipping undecodable frame");
                        batch.skipped += 1;
                    }
                },
                Ok(FrameRead::Timeout) => continue,
                Ok(FrameRead::Exhausted) => {
                    debug!(interface = %self.interface, "capture source exhausted");
                    self.exhausted = true;
                }
                Err(e) if batch.packets.is_empty() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "read failed mid-batch, returning partial batch");
                    self.pending_error = Some(e);
                    break;
                }
            }
        }

        Ok(batch)
    }

    /// Releases the source. Later calls return empty batches.
    pub fn close(&mut self) {
        self.close.close();
        if self.source.take().is_some() {
            debug!(interface = %self.interface, "capture session closed");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    use etherparse::PacketBuilder;
    use tracing_test::traced_test;

    fn tcp_frame(syn: bool) -> Frame {
        let mut builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(1234, 80, 7, 1024);
        if syn {
            builder = builder.syn();
        }
        let mut data = Vec::new();
        builder.write(&mut data, b"").unwrap();
        Frame::new(data, 0.0)
    }

    /// Replays a fixed script of reads, then times out forever.
    struct Scripted {
        reads: VecDeque<Result<FrameRead, CaptureError>>,
        drops: Arc<AtomicUsize>,
    }

    impl PacketSource for Scripted {
        fn next_frame(&mut self) -> Result<FrameRead, CaptureError> {
            match self.reads.pop_front() {
                Some(read) => read,
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Ok(FrameRead::Timeout)
                }
            }
        }
    }

    impl Drop for Scripted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedBackend {
        script: Mutex<Option<VecDeque<Result<FrameRead, CaptureError>>>>,
        drops: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<FrameRead, CaptureError>>) -> Self {
            Self {
                script: Mutex::new(Some(script.into())),
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl CaptureBackend for ScriptedBackend {
        fn interface_names(&self) -> Result<Vec<String>, CaptureError> {
            Ok(vec!["test0".into()])
        }

        fn open(
            &self,
            _interface: &str,
            _config: &CaptureConfig,
        ) -> Result<Box<dyn PacketSource>, CaptureError> {
            let reads = self.script.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(Scripted {
                reads,
                drops: self.drops.clone(),
            }))
        }
    }

    fn open(backend: &ScriptedBackend) -> CaptureSession {
        CaptureSession::open(backend, "test0", &CaptureConfig::default()).unwrap()
    }

    #[test]
    fn collects_up_to_max_count_in_order() {
        let backend = ScriptedBackend::new(vec![
            Ok(FrameRead::Frame(tcp_frame(true))),
            Ok(FrameRead::Timeout),
            Ok(FrameRead::Frame(tcp_frame(false))),
            Ok(FrameRead::Frame(tcp_frame(true))),
        ]);
        let mut session = open(&backend);

        let batch = session.next_batch(2).unwrap();
        assert_eq!(batch.packets.len(), 2);
        assert!(batch.packets[0].syn);
        assert!(!batch.packets[1].syn);

        let batch = session.next_batch(1).unwrap();
        assert_eq!(batch.packets.len(), 1);
        assert!(batch.packets[0].syn);
    }

    #[test]
    fn undecodable_frames_are_skipped() {
        let backend = ScriptedBackend::new(vec![
            Ok(FrameRead::Frame(Frame::new(vec![0xde, 0xad], 0.0))),
            Ok(FrameRead::Frame(tcp_frame(true))),
        ]);
        let mut session = open(&backend);

        let batch = session.next_batch(1).unwrap();
        assert_eq!(batch.packets.len(), 1);
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn exhausted_source_returns_partial_batch() {
        let backend = ScriptedBackend::new(vec![
            Ok(FrameRead::Frame(tcp_frame(false))),
            Ok(FrameRead::Exhausted),
        ]);
        let mut session = open(&backend);

        let batch = session.next_batch(10).unwrap();
        assert_eq!(batch.packets.len(), 1);
        assert!(session.is_finished());
        assert!(session.next_batch(10).unwrap().packets.is_empty());
    }

    #[traced_test]
    #[test]
    fn read_error_after_packets_is_deferred() {
        let backend = ScriptedBackend::new(vec![
            Ok(FrameRead::Frame(tcp_frame(false))),
            Err(CaptureError::Read("link down".into())),
        ]);
        let mut session = open(&backend);

        assert_eq!(session.next_batch(10).unwrap().packets.len(), 1);
        assert_eq!(
            session.next_batch(10).unwrap_err(),
            CaptureError::Read("link down".into())
        );
        assert!(logs_contain("read failed mid-batch"));
    }

    #[test]
    fn close_unblocks_a_waiting_read() {
        let backend = ScriptedBackend::new(Vec::new());
        let mut session = open(&backend);
        let handle = session.close_handle();

        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            handle.close();
        });

        let started = Instant::now();
        let batch = session.next_batch(100).unwrap();
        closer.join().unwrap();

        assert!(batch.packets.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn source_is_released_exactly_once() {
        let backend = ScriptedBackend::new(Vec::new());
        let drops = backend.drops.clone();
        let mut session = open(&backend);

        session.close();
        session.close();
        drop(session);

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
