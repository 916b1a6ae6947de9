//! Streaming feeder: keeps the playback buffer topped up from the wave file
//!
//! Each cycle checks for cancellation, fills whatever space the buffer has
//! free from the current stream position, then waits one poll interval (or
//! until cancelled). Reads never run past the stream end: the loop end when
//! the file has loop metadata, the data end otherwise. A looping stream
//! continues from the loop start on the cycle after it reaches the loop end;
//! a non-looping stream finishes once its last bytes are delivered.

use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use sndstrm_core::{LoopByteRange, WaveFileInfo};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::playback_buffer::{ByteSink, PlaybackBufferError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error reading wave data: {0}")]
    Io(#[from] io::Error),
    #[error("Playback buffer error: {0}")]
    Buffer(#[from] PlaybackBufferError),
    #[error("Loop {start}..{end} is not inside the data chunk {data_start}..{data_end}")]
    LoopOutOfBounds {
        start: u64,
        end: u64,
        data_start: u64,
        data_end: u64,
    },
    #[error("Feeder thread panicked")]
    Panicked,
}

/// How a feed run ended, with the total bytes appended to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    Finished { delivered: u64 },
    Cancelled { delivered: u64 },
}

impl FeedOutcome {
    pub fn delivered(&self) -> u64 {
        match self {
            FeedOutcome::Finished { delivered } | FeedOutcome::Cancelled { delivered } => {
                *delivered
            }
        }
    }
}

/// Requests cancellation of a running feed. Dropping it cancels too.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Feeder side of a cancellation pair. Once cancelled it stays cancelled.
#[derive(Debug)]
pub struct CancelToken {
    rx: Receiver<()>,
    cancelled: Cell<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        if !self.cancelled.get() {
            let signalled = matches!(self.rx.try_recv(), Ok(()) | Err(TryRecvError::Disconnected));
            self.cancelled.set(signalled);
        }
        self.cancelled.get()
    }

    /// Sleeps for `timeout` unless cancelled first. Returns true if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.cancelled.get() {
            return true;
        }
        let signalled = match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };
        self.cancelled.set(signalled);
        signalled
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = bounded(1);
    (
        CancelHandle { tx },
        CancelToken {
            rx,
            cancelled: Cell::new(false),
        },
    )
}

pub struct StreamingBufferFeeder<R, B> {
    source: R,
    sink: B,
    position: u64,
    stream_end: u64,
    loop_range: Option<LoopByteRange>,
    poll_interval: Duration,
    delivered: u64,
    finished: bool,
    scratch: Vec<u8>,
}

impl<R, B> StreamingBufferFeeder<R, B>
where
    R: Read + Seek,
    B: ByteSink,
{
    /// Starts at the beginning of the data chunk. A loop range that does not
    /// sit inside the data chunk is refused up front.
    pub fn new(source: R, sink: B, info: &WaveFileInfo) -> Result<Self, FeedError> {
        let data = info.data();
        let loop_range = info.loop_range();
        if let Some(range) = loop_range {
            if !range.is_within(data) {
                return Err(FeedError::LoopOutOfBounds {
                    start: range.start,
                    end: range.end,
                    data_start: data.start,
                    data_end: data.end,
                });
            }
        }

        Ok(Self {
            source,
            sink,
            position: data.start,
            stream_end: info.stream_end(),
            loop_range,
            poll_interval: DEFAULT_POLL_INTERVAL,
            delivered: 0,
            finished: false,
            scratch: Vec::new(),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Offset the next read starts from
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn stream_end(&self) -> u64 {
        self.stream_end
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// True once a non-looping stream has delivered its last byte.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// One compute-and-fill pass. Returns the number of bytes appended.
    pub fn fill(&mut self) -> Result<usize, FeedError> {
        if self.finished {
            return Ok(0);
        }

        let free = self.sink.free_space() as u64;
        let mut len = free;
        let mut wrap_to = None;

        if self.position + free >= self.stream_end {
            len = self.stream_end.saturating_sub(self.position);
            match self.loop_range {
                Some(range) => wrap_to = Some(range.start),
                None => self.finished = true,
            }
        }

        if len > 0 {
            let len = len as usize;
            self.scratch.resize(len, 0);
            self.source.seek(SeekFrom::Start(self.position))?;
            self.source.read_exact(&mut self.scratch[..len])?;
            self.sink.append(&self.scratch[..len])?;
            self.position += len as u64;
            self.delivered += len as u64;
        }

        if let Some(start) = wrap_to {
            trace!(from = self.position, to = start, "wrapping to loop start");
            self.position = start;
        }

        Ok(len as usize)
    }

    /// Runs fill cycles until the stream finishes or `cancel` fires. An I/O
    /// or buffer error ends the run immediately.
    pub fn run(mut self, cancel: &CancelToken) -> Result<FeedOutcome, FeedError> {
        info!(
            start = self.position,
            end = self.stream_end,
            looping = self.loop_range.is_some(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Feeder started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let appended = self.fill()?;
            debug!(appended, position = self.position, "fill cycle");

            if self.finished {
                info!(delivered = self.delivered, "Feeder reached end of data");
                return Ok(FeedOutcome::Finished {
                    delivered: self.delivered,
                });
            }

            if cancel.wait(self.poll_interval) {
                break;
            }
        }

        info!(delivered = self.delivered, "Feeder cancelled");
        Ok(FeedOutcome::Cancelled {
            delivered: self.delivered,
        })
    }
}

/// A feeder running on its own thread.
pub struct FeederHandle {
    cancel: CancelHandle,
    thread: Option<JoinHandle<Result<FeedOutcome, FeedError>>>,
}

impl FeederHandle {
    pub fn spawn<R, B>(feeder: StreamingBufferFeeder<R, B>) -> io::Result<Self>
    where
        R: Read + Seek + Send + 'static,
        B: ByteSink + Send + 'static,
    {
        let (cancel, token) = cancel_pair();
        let thread = thread::Builder::new()
            .name("sndstrm-feeder".into())
            .spawn(move || feeder.run(&token))?;

        Ok(Self {
            cancel,
            thread: Some(thread),
        })
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the feeder has stopped, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Collects the result if the thread has already exited. Returns `None`
    /// while it is still running or once the result has been taken.
    pub fn try_join(&mut self) -> Option<Result<FeedOutcome, FeedError>> {
        if !self.thread.as_ref()?.is_finished() {
            return None;
        }
        let thread = self.thread.take()?;
        Some(thread.join().map_err(|_| FeedError::Panicked).and_then(|res| res))
    }

    /// Waits for the feeder thread. Does not cancel it first.
    pub fn join(mut self) -> Result<FeedOutcome, FeedError> {
        let Some(thread) = self.thread.take() else {
            return Err(FeedError::Panicked);
        };
        thread.join().map_err(|_| FeedError::Panicked)?
    }
}

impl Drop for FeederHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use sndstrm_core::test_support::{pcm_wave, WaveBuilder};
    use sndstrm_core::{parse_wave, PcmFormat};

    use crate::playback_buffer::PlaybackBuffer;

    /// Records every append; the fill level is set by hand so tests can play
    /// the consumer.
    #[derive(Default)]
    struct RecordingSink {
        capacity: usize,
        buffered: Mutex<usize>,
        appends: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingSink {
        fn new(capacity: usize, buffered: usize) -> Self {
            Self {
                capacity,
                buffered: Mutex::new(buffered),
                appends: Mutex::new(Vec::new()),
            }
        }

        fn drain_all(&self) {
            *self.buffered.lock().unwrap() = 0;
        }

        fn appends(&self) -> Vec<Vec<u8>> {
            self.appends.lock().unwrap().clone()
        }
    }

    impl ByteSink for RecordingSink {
        fn capacity(&self) -> usize {
            self.capacity
        }

        fn buffered_bytes(&self) -> usize {
            *self.buffered.lock().unwrap()
        }

        fn append(&self, bytes: &[u8]) -> Result<(), PlaybackBufferError> {
            *self.buffered.lock().unwrap() += bytes.len();
            self.appends.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    fn feeder_for(
        bytes: Vec<u8>,
        sink: Arc<RecordingSink>,
    ) -> StreamingBufferFeeder<Cursor<Vec<u8>>, Arc<RecordingSink>> {
        let mut cursor = Cursor::new(bytes);
        let info = parse_wave(&mut cursor).unwrap();
        StreamingBufferFeeder::new(cursor, sink, &info)
            .unwrap()
            .with_poll_interval(Duration::ZERO)
    }

    fn stereo16() -> PcmFormat {
        PcmFormat::new(2, 44_100, 16)
    }

    #[test]
    fn non_looping_stream_clamps_to_data_end() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let sink = Arc::new(RecordingSink::new(100, 90));
        let mut feeder = feeder_for(pcm_wave(&stereo16(), &data), sink.clone());

        assert_eq!(feeder.position(), 44);
        assert_eq!(feeder.fill().unwrap(), 8);
        assert!(feeder.is_finished());
        assert_eq!(feeder.delivered(), 8);

        sink.drain_all();
        assert_eq!(feeder.fill().unwrap(), 0);
        assert_eq!(sink.appends(), vec![data.to_vec()]);
    }

    #[test]
    fn small_free_space_takes_several_cycles() {
        let data: Vec<u8> = (0..20).collect();
        let sink = Arc::new(RecordingSink::new(6, 0));
        let mut feeder = feeder_for(pcm_wave(&PcmFormat::new(1, 8_000, 8), &data), sink.clone());

        let mut cycles = 0;
        while !feeder.is_finished() {
            feeder.fill().unwrap();
            sink.drain_all();
            cycles += 1;
        }

        assert_eq!(cycles, 4);
        let appended: Vec<u8> = sink.appends().concat();
        assert_eq!(appended, data);
        assert_eq!(sink.appends().iter().map(Vec::len).collect::<Vec<_>>(), vec![6, 6, 6, 2]);
    }

    #[test]
    fn full_buffer_reads_nothing() {
        let sink = Arc::new(RecordingSink::new(10, 10));
        let mut feeder = feeder_for(pcm_wave(&stereo16(), &[0; 8]), sink.clone());

        assert_eq!(feeder.fill().unwrap(), 0);
        assert!(!feeder.is_finished());
        assert!(sink.appends().is_empty());
    }

    #[test]
    fn looping_stream_wraps_to_loop_start() {
        // mono 8-bit: one byte per frame, data starts at 44
        let data: Vec<u8> = (0..10).collect();
        let bytes = WaveBuilder::new()
            .fmt(&PcmFormat::new(1, 8_000, 8))
            .data(&data)
            .smpl(&[(2, 6)])
            .build();
        let sink = Arc::new(RecordingSink::new(5, 0));
        let mut feeder = feeder_for(bytes, sink.clone());
        assert_eq!(feeder.stream_end(), 50);

        for _ in 0..4 {
            feeder.fill().unwrap();
            sink.drain_all();
        }

        // intro 0,1 then the loop body 2..6 repeats
        assert_eq!(
            sink.appends(),
            vec![vec![0, 1, 2, 3, 4], vec![5], vec![2, 3, 4, 5], vec![2, 3, 4, 5]]
        );
        assert!(!feeder.is_finished());
    }

    #[test]
    fn read_after_loop_end_starts_at_loop_start() {
        let data: Vec<u8> = (0..8).collect();
        let bytes = WaveBuilder::new()
            .fmt(&PcmFormat::new(1, 8_000, 8))
            .data(&data)
            .smpl(&[(1, 8)])
            .build();
        let sink = Arc::new(RecordingSink::new(100, 0));
        let mut feeder = feeder_for(bytes, sink.clone());

        feeder.fill().unwrap();
        assert_eq!(feeder.position(), 45);
        sink.drain_all();
        feeder.fill().unwrap();

        let appends = sink.appends();
        assert_eq!(appends[0], data);
        assert_eq!(appends[1], data[1..].to_vec());
    }

    #[test]
    fn reads_stay_inside_stream_bounds() {
        let data: Vec<u8> = (0..64).collect();
        let bytes = WaveBuilder::new()
            .fmt(&PcmFormat::new(2, 8_000, 16))
            .data(&data)
            .smpl(&[(3, 11)])
            .build();
        let sink = Arc::new(RecordingSink::new(7, 0));
        let mut feeder = feeder_for(bytes, sink.clone());
        let (start, end) = (44u64, 44 + 11 * 4);

        for _ in 0..50 {
            let before = feeder.position();
            let n = feeder.fill().unwrap() as u64;
            assert!(before >= start);
            assert!(before + n <= end);
            sink.drain_all();
        }
    }

    #[test]
    fn loop_outside_data_is_refused() {
        let bytes = WaveBuilder::new()
            .fmt(&stereo16())
            .data(&[0; 8])
            .smpl(&[(1, 5)])
            .build();
        let mut cursor = Cursor::new(bytes);
        let info = parse_wave(&mut cursor).unwrap();

        match StreamingBufferFeeder::new(cursor, Arc::new(RecordingSink::new(8, 0)), &info) {
            Err(FeedError::LoopOutOfBounds { start, end, data_start, data_end }) => {
                assert_eq!((start, end, data_start, data_end), (48, 64, 44, 52));
            }
            Ok(_) => panic!("feeder accepted a loop past the data end"),
            Err(other) => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn truncated_source_is_a_fatal_io_error() {
        let mut bytes = pcm_wave(&stereo16(), &[0; 16]);
        let mut cursor = Cursor::new(bytes.clone());
        let info = parse_wave(&mut cursor).unwrap();
        bytes.truncate(50);

        let sink = Arc::new(RecordingSink::new(64, 0));
        let mut feeder =
            StreamingBufferFeeder::new(Cursor::new(bytes), sink.clone(), &info).unwrap();
        match feeder.fill() {
            Err(FeedError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io error, got {other:?}"),
        }
        assert!(sink.appends().is_empty());
    }

    #[test]
    fn run_finishes_non_looping_stream() {
        let data: Vec<u8> = (0..32).collect();
        let mut cursor = Cursor::new(pcm_wave(&PcmFormat::new(1, 8_000, 8), &data));
        let info = parse_wave(&mut cursor).unwrap();
        let buffer = Arc::new(PlaybackBuffer::new(64));

        let feeder = StreamingBufferFeeder::new(cursor, buffer.clone(), &info)
            .unwrap()
            .with_poll_interval(Duration::ZERO);
        let (_handle, token) = cancel_pair();

        assert_eq!(feeder.run(&token).unwrap(), FeedOutcome::Finished { delivered: 32 });
        let mut out = [0u8; 64];
        assert_eq!(buffer.read_aligned(&mut out, 1), 32);
        assert_eq!(&out[..32], &data[..]);
    }

    #[test]
    fn feeds_from_a_file_on_disk() {
        use std::io::Write;

        let data: Vec<u8> = (0..=255).collect();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&pcm_wave(&stereo16(), &data)).unwrap();
        tmp.flush().unwrap();

        let (file, info) = sndstrm_core::open_wave_file(tmp.path()).unwrap();
        let buffer = Arc::new(PlaybackBuffer::new(1024));
        let feeder = StreamingBufferFeeder::new(file, buffer.clone(), &info)
            .unwrap()
            .with_poll_interval(Duration::ZERO);
        let (_handle, token) = cancel_pair();

        assert_eq!(feeder.run(&token).unwrap(), FeedOutcome::Finished { delivered: 256 });
        let mut out = vec![0u8; 256];
        assert_eq!(buffer.read_aligned(&mut out, 4), 256);
        assert_eq!(out, data);
    }

    #[test]
    fn cancel_before_run_reads_nothing() {
        let sink = Arc::new(RecordingSink::new(64, 0));
        let feeder = feeder_for(pcm_wave(&stereo16(), &[0; 8]), sink.clone());
        let (handle, token) = cancel_pair();
        handle.cancel();

        assert_eq!(feeder.run(&token).unwrap(), FeedOutcome::Cancelled { delivered: 0 });
        assert!(sink.appends().is_empty());
    }

    #[test]
    fn dropping_the_handle_cancels() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        drop(handle);
        assert!(token.is_cancelled());
        assert!(token.wait(Duration::from_secs(5)));
    }

    #[test]
    fn cancel_wakes_a_sleeping_feeder() {
        let bytes = WaveBuilder::new()
            .fmt(&PcmFormat::new(1, 8_000, 8))
            .data(&[0; 16])
            .smpl(&[(0, 16)])
            .build();
        let mut cursor = Cursor::new(bytes);
        let info = parse_wave(&mut cursor).unwrap();
        let sink = Arc::new(RecordingSink::new(8, 0));

        let feeder = StreamingBufferFeeder::new(cursor, sink.clone(), &info)
            .unwrap()
            .with_poll_interval(Duration::from_secs(30));
        let handle = FeederHandle::spawn(feeder).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.appends().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let started = Instant::now();
        handle.cancel();
        let outcome = handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome, FeedOutcome::Cancelled { delivered: 8 });
        assert_eq!(sink.appends().len(), 1);
    }

    #[test]
    fn spawned_feeder_reports_io_failure() {
        let mut bytes = pcm_wave(&stereo16(), &[0; 16]);
        let mut cursor = Cursor::new(bytes.clone());
        let info = parse_wave(&mut cursor).unwrap();
        bytes.truncate(48);

        let buffer = Arc::new(PlaybackBuffer::new(64));
        let feeder = StreamingBufferFeeder::new(Cursor::new(bytes), buffer, &info).unwrap();
        let handle = FeederHandle::spawn(feeder).unwrap();
        assert!(matches!(handle.join(), Err(FeedError::Io(_))));
    }

    #[test]
    fn try_join_collects_a_finished_run_once() {
        let mut cursor = Cursor::new(pcm_wave(&stereo16(), &[7; 12]));
        let info = parse_wave(&mut cursor).unwrap();
        let feeder = StreamingBufferFeeder::new(cursor, Arc::new(PlaybackBuffer::new(64)), &info)
            .unwrap()
            .with_poll_interval(Duration::ZERO);
        let mut handle = FeederHandle::spawn(feeder).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let outcome = loop {
            if let Some(result) = handle.try_join() {
                break result.unwrap();
            }
            assert!(Instant::now() < deadline, "feeder never finished");
            thread::sleep(Duration::from_millis(5));
        };

        assert_eq!(outcome, FeedOutcome::Finished { delivered: 12 });
        assert!(handle.is_finished());
        assert!(handle.try_join().is_none());
    }
}
