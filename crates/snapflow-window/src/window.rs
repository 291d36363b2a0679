use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::error::{Error, Result};
use crate::range::RangeTracker;
use crate::wake::{WakeSet, Waiter};

/// Outcome of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were copied into the caller's buffer.
    Data(usize),
    /// The window is closed and every written byte has been consumed.
    EndOfStream,
}

/// Lifecycle of a window: `Open -> Closed -> Drained`, or `Cancelled` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Open,
    Closed,
    Drained,
    Cancelled,
}

/// Fixed-capacity circular buffer addressed by absolute stream offset.
///
/// Any number of writers may call [`write_at`](Self::write_at) concurrently
/// with arbitrary non-overlapping offsets; a single reader consumes the bytes
/// in offset order through [`read_blocking`](Self::read_blocking),
/// [`read`](Self::read) or a [`WindowReader`]. A write whose range lies beyond
/// `head + capacity` parks until the reader has made room.
///
/// All state sits behind one mutex. Waiting always happens with the lock
/// released: the waiter registers on the [`WakeSet`] while still holding the
/// lock, drops it, then parks.
#[derive(Debug)]
pub struct ByteWindow {
    capacity: usize,
    state:    Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    storage:   Box<[u8]>,
    head:      u64,
    ranges:    RangeTracker,
    wakers:    WakeSet,
    closed:    bool,
    cancelled: bool,
}

enum Step<T> {
    Ready(T),
    Wait(Waiter),
}

impl ByteWindow {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            state: Mutex::new(WindowState {
                storage:   vec![0u8; capacity].into_boxed_slice(),
                head:      0,
                ranges:    RangeTracker::new(),
                wakers:    WakeSet::new(),
                closed:    false,
                cancelled: false,
            }),
        })
    }

    pub fn capacity(&self) -> usize { self.capacity }

    /// Smallest stream offset not yet consumed by the reader.
    pub fn head(&self) -> u64 { self.lock().head }

    pub fn is_closed(&self) -> bool { self.lock().closed }

    pub fn is_cancelled(&self) -> bool { self.lock().cancelled }

    /// Number of written-but-unread ranges currently tracked.
    pub fn pending_ranges(&self) -> usize { self.lock().ranges.len() }

    pub fn phase(&self) -> WindowPhase {
        let state = self.lock();
        if state.cancelled {
            WindowPhase::Cancelled
        } else if !state.closed {
            WindowPhase::Open
        } else if state.ranges.is_empty() {
            WindowPhase::Drained
        } else {
            WindowPhase::Closed
        }
    }

    /// Copy `data` into the window at `offset`, parking the task until the
    /// target range fits inside `[head, head + capacity)`.
    ///
    /// Never writes partially: on success the return value is `data.len()`.
    pub async fn write_at(&self, data: &[u8], offset: u64) -> Result<usize> {
        loop {
            match self.try_write(data, offset)? {
                Step::Ready(n) => return Ok(n),
                Step::Wait(waiter) => waiter.wait().await,
            }
        }
    }

    /// Thread-blocking variant of [`write_at`](Self::write_at).
    pub fn write_at_blocking(&self, data: &[u8], offset: u64) -> Result<usize> {
        loop {
            match self.try_write(data, offset)? {
                Step::Ready(n) => return Ok(n),
                Step::Wait(waiter) => waiter.wait_blocking(),
            }
        }
    }

    /// Copy the next contiguous bytes at `head` into `buf`, parking the task
    /// while a gap separates `head` from the next written range.
    pub async fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome> {
        loop {
            match self.try_read(buf)? {
                Step::Ready(outcome) => return Ok(outcome),
                Step::Wait(waiter) => waiter.wait().await,
            }
        }
    }

    /// Thread-blocking variant of [`read`](Self::read).
    pub fn read_blocking(&self, buf: &mut [u8]) -> Result<ReadOutcome> {
        loop {
            match self.try_read(buf)? {
                Step::Ready(outcome) => return Ok(outcome),
                Step::Wait(waiter) => waiter.wait_blocking(),
            }
        }
    }

    /// Mark the end of the stream. Idempotent.
    ///
    /// Ranges already written stay readable; once they are drained every read
    /// reports [`ReadOutcome::EndOfStream`].
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            trace!(head = state.head, pending = state.ranges.len(), "closing window");
        }
        state.closed = true;
        state.wakers.notify_all();
    }

    /// Fail every parked and future read or write with [`Error::Cancelled`]. Idempotent.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if !state.cancelled {
            trace!(head = state.head, "cancelling window");
        }
        state.cancelled = true;
        state.wakers.notify_all();
    }

    /// Sequential [`io::Read`] adapter over this window.
    pub fn reader(self: &Arc<Self>) -> WindowReader {
        WindowReader {
            window: Arc::clone(self),
        }
    }

    fn try_write(&self, data: &[u8], offset: u64) -> Result<Step<usize>> {
        let len = data.len();
        if len > self.capacity {
            return Err(Error::WriteTooLarge {
                len,
                capacity: self.capacity,
            });
        }

        let mut state = self.lock();
        if state.cancelled {
            return Err(Error::Cancelled);
        }
        if state.closed {
            return Err(Error::Closed);
        }
        if len == 0 {
            return Ok(Step::Ready(0));
        }
        if offset < state.head {
            return Err(Error::StaleOffset {
                offset,
                head: state.head,
            });
        }

        let end = offset
            .checked_add(len as u64)
            .ok_or(Error::OffsetOverflow { offset, len })?;
        if end > state.head.saturating_add(self.capacity as u64) {
            trace!(offset, end, head = state.head, "write parked outside window");
            return Ok(Step::Wait(state.wakers.register()));
        }

        copy_into_ring(&mut state.storage, offset, data);
        state.ranges.insert(offset, end);
        state.wakers.notify_all();
        trace!(offset, end, "write committed");

        Ok(Step::Ready(len))
    }

    fn try_read(&self, buf: &mut [u8]) -> Result<Step<ReadOutcome>> {
        if buf.is_empty() {
            return Ok(Step::Ready(ReadOutcome::Data(0)));
        }

        let mut state = self.lock();
        loop {
            if state.cancelled {
                return Err(Error::Cancelled);
            }

            let head = state.head;
            let Some(next) = state.ranges.peek_min() else {
                if state.closed {
                    return Ok(Step::Ready(ReadOutcome::EndOfStream));
                }
                trace!(head, "read parked on empty window");
                return Ok(Step::Wait(state.wakers.register()));
            };

            // Leftover of an overlapping write that has already been consumed.
            if next.end <= head {
                state.ranges.pop_min();
                continue;
            }

            if next.start > head {
                if state.closed {
                    return Err(Error::Truncated {
                        head,
                        next: next.start,
                    });
                }
                trace!(head, next = next.start, "read parked on gap");
                return Ok(Step::Wait(state.wakers.register()));
            }

            let available = next.end - head;
            let n = buf.len().min(usize::try_from(available).unwrap_or(usize::MAX));
            copy_from_ring(&state.storage, head, &mut buf[..n]);

            state.ranges.pop_min();
            let consumed_to = head + n as u64;
            state.ranges.insert(consumed_to, next.end);
            state.head = consumed_to;
            state.wakers.notify_all();
            trace!(from = head, to = consumed_to, "read committed");

            return Ok(Step::Ready(ReadOutcome::Data(n)));
        }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        // Every critical section leaves the state consistent before it can panic.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn copy_into_ring(storage: &mut [u8], offset: u64, data: &[u8]) {
    let capacity = storage.len();
    let at = (offset % capacity as u64) as usize;
    let first = data.len().min(capacity - at);
    storage[at..at + first].copy_from_slice(&data[..first]);
    storage[..data.len() - first].copy_from_slice(&data[first..]);
}

fn copy_from_ring(storage: &[u8], offset: u64, out: &mut [u8]) {
    let capacity = storage.len();
    let at = (offset % capacity as u64) as usize;
    let first = out.len().min(capacity - at);
    let (head, tail) = out.split_at_mut(first);
    head.copy_from_slice(&storage[at..at + first]);
    tail.copy_from_slice(&storage[..tail.len()]);
}

/// Blocking [`io::Read`] view of a [`ByteWindow`]. `Ok(0)` means end of stream.
///
/// Must not be driven from inside an async runtime context; run it on a
/// dedicated thread or in `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct WindowReader {
    window: Arc<ByteWindow>,
}

impl WindowReader {
    pub fn window(&self) -> &Arc<ByteWindow> { &self.window }
}

impl io::Read for WindowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.window.read_blocking(buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::EndOfStream => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::Duration;

    fn read_all(window: &ByteWindow, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            match window.read_blocking(&mut buf).unwrap() {
                ReadOutcome::Data(n) => out.extend_from_slice(&buf[..n]),
                ReadOutcome::EndOfStream => return out,
            }
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(ByteWindow::new(0), Err(Error::ZeroCapacity)));
    }

    #[test]
    fn out_of_order_writes_read_back_in_order() {
        let window = ByteWindow::new(16).unwrap();
        assert_eq!(window.write_at_blocking(b"DEFG", 4).unwrap(), 4);
        assert_eq!(window.write_at_blocking(b"ABCD", 0).unwrap(), 4);

        let mut buf = [0u8; 8];
        assert_eq!(window.read_blocking(&mut buf).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf[..4], b"ABCD");
        assert_eq!(window.read_blocking(&mut buf[4..]).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf, b"ABCDDEFG");
        assert_eq!(window.head(), 8);

        window.close();
        assert_eq!(window.read_blocking(&mut buf).unwrap(), ReadOutcome::EndOfStream);
        assert_eq!(window.read_blocking(&mut buf).unwrap(), ReadOutcome::EndOfStream);
        assert_eq!(window.phase(), WindowPhase::Drained);
    }

    #[test]
    fn io_reader_collects_the_scenario_bytes() {
        let window = Arc::new(ByteWindow::new(16).unwrap());
        window.write_at_blocking(b"DEFG", 4).unwrap();
        window.write_at_blocking(b"ABCD", 0).unwrap();
        window.close();

        let mut out = Vec::new();
        window.reader().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"ABCDDEFG");
        assert_eq!(window.head(), 8);
    }

    #[test]
    fn partial_read_reinserts_the_remainder() {
        let window = ByteWindow::new(8).unwrap();
        window.write_at_blocking(b"abcdef", 0).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(window.read_blocking(&mut buf).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf, b"abcd");
        assert_eq!(window.pending_ranges(), 1);
        assert_eq!(window.read_blocking(&mut buf).unwrap(), ReadOutcome::Data(2));
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(window.pending_ranges(), 0);
    }

    #[test]
    fn writes_and_reads_wrap_around_the_ring() {
        let window = ByteWindow::new(8).unwrap();
        window.write_at_blocking(b"012345", 0).unwrap();

        let mut buf = [0u8; 6];
        window.read_blocking(&mut buf).unwrap();
        assert_eq!(&buf, b"012345");

        // Offsets 6..12 occupy slots 6, 7, 0, 1, 2, 3.
        window.write_at_blocking(b"6789AB", 6).unwrap();
        assert_eq!(window.read_blocking(&mut buf).unwrap(), ReadOutcome::Data(6));
        assert_eq!(&buf, b"6789AB");
        assert_eq!(window.head(), 12);
    }

    #[test]
    fn oversized_write_fails_without_touching_state() {
        let window = ByteWindow::new(4).unwrap();
        let err = window.write_at_blocking(b"too long", 0).unwrap_err();
        assert!(matches!(err, Error::WriteTooLarge { len: 8, capacity: 4 }));
        assert!(err.is_fatal());
        assert_eq!(window.pending_ranges(), 0);
        assert_eq!(window.head(), 0);
    }

    #[test]
    fn write_behind_head_is_stale() {
        let window = ByteWindow::new(8).unwrap();
        window.write_at_blocking(b"abcd", 0).unwrap();
        let mut buf = [0u8; 4];
        window.read_blocking(&mut buf).unwrap();

        let err = window.write_at_blocking(b"xy", 2).unwrap_err();
        assert!(matches!(err, Error::StaleOffset { offset: 2, head: 4 }));
    }

    #[test]
    fn write_past_the_end_of_the_offset_space_fails() {
        let window = ByteWindow::new(8).unwrap();
        let err = window.write_at_blocking(b"ab", u64::MAX - 1).unwrap_err();
        assert!(matches!(err, Error::OffsetOverflow { offset, len: 2 } if offset == u64::MAX - 1));
        assert!(err.is_fatal());
        assert_eq!(window.pending_ranges(), 0);
        assert_eq!(window.head(), 0);
    }

    #[test]
    fn write_after_close_is_rejected() {
        let window = ByteWindow::new(8).unwrap();
        window.close();
        window.close();
        assert!(matches!(window.write_at_blocking(b"a", 0), Err(Error::Closed)));
    }

    #[test]
    fn empty_write_tracks_nothing() {
        let window = ByteWindow::new(8).unwrap();
        assert_eq!(window.write_at_blocking(b"", 3).unwrap(), 0);
        assert_eq!(window.pending_ranges(), 0);
    }

    #[test]
    fn close_with_pending_ranges_still_delivers_them() {
        let window = ByteWindow::new(16).unwrap();
        window.write_at_blocking(b"hello", 0).unwrap();
        window.write_at_blocking(b" world", 5).unwrap();
        window.close();
        assert_eq!(window.phase(), WindowPhase::Closed);

        assert_eq!(read_all(&window, 3), b"hello world");
        assert_eq!(window.phase(), WindowPhase::Drained);
    }

    #[test]
    fn close_with_gap_reports_truncation() {
        let window = ByteWindow::new(16).unwrap();
        window.write_at_blocking(b"tail", 8).unwrap();
        window.close();

        let mut buf = [0u8; 4];
        let err = window.read_blocking(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Truncated { head: 0, next: 8 }));
    }

    #[test]
    fn close_wakes_a_parked_reader() {
        let window = Arc::new(ByteWindow::new(8).unwrap());
        let reader = {
            let window = Arc::clone(&window);
            std::thread::spawn(move || {
                let mut buf = [0u8; 4];
                window.read_blocking(&mut buf)
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        window.close();
        assert_eq!(reader.join().unwrap().unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn cancel_fails_parked_writer_and_reader() {
        let window = Arc::new(ByteWindow::new(4).unwrap());
        let writer = {
            let window = Arc::clone(&window);
            std::thread::spawn(move || window.write_at_blocking(b"zz", 10))
        };
        let reader = {
            let window = Arc::clone(&window);
            std::thread::spawn(move || {
                let mut buf = [0u8; 4];
                window.read_blocking(&mut buf)
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        window.cancel();

        assert!(matches!(writer.join().unwrap(), Err(Error::Cancelled)));
        assert!(matches!(reader.join().unwrap(), Err(Error::Cancelled)));
        assert_eq!(window.phase(), WindowPhase::Cancelled);
    }

    #[test]
    fn truncation_surfaces_as_unexpected_eof() {
        let window = Arc::new(ByteWindow::new(8).unwrap());
        window.write_at_blocking(b"x", 4).unwrap();
        window.close();

        let mut out = Vec::new();
        let err = window.reader().read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn write_beyond_window_waits_for_reader() {
        let window = Arc::new(ByteWindow::new(8).unwrap());
        window.write_at(b"abcdefgh", 0).await.unwrap();

        // head = 0, capacity 8: offset 8 does not fit until the reader advances.
        let pending = {
            let window = Arc::clone(&window);
            tokio::spawn(async move { window.write_at(b"ijkl", 8).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "write must stay parked while the window is full");
        assert_eq!(window.pending_ranges(), 1);

        let mut buf = [0u8; 4];
        assert_eq!(window.read(&mut buf).await.unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf, b"abcd");

        let written = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("write should resume once head advanced")
            .unwrap()
            .unwrap();
        assert_eq!(written, 4);

        window.close();
        let mut rest = [0u8; 8];
        assert_eq!(window.read(&mut rest).await.unwrap(), ReadOutcome::Data(4));
        assert_eq!(&rest[..4], b"efgh");
        assert_eq!(window.read(&mut rest).await.unwrap(), ReadOutcome::Data(4));
        assert_eq!(&rest[..4], b"ijkl");
        assert_eq!(window.read(&mut rest).await.unwrap(), ReadOutcome::EndOfStream);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reverse_order_writers_feed_an_ordered_reader() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let window = Arc::new(ByteWindow::new(512).unwrap());

        let mut writers = Vec::new();
        for (i, chunk) in data.chunks(128).enumerate().rev() {
            let window = Arc::clone(&window);
            let chunk = chunk.to_vec();
            writers.push(tokio::spawn(async move {
                window.write_at(&chunk, (i * 128) as u64).await
            }));
        }

        let reader = {
            let window = Arc::clone(&window);
            tokio::task::spawn_blocking(move || {
                let mut out = Vec::new();
                window.reader().read_to_end(&mut out).map(|_| out)
            })
        };

        for writer in writers {
            writer.await.unwrap().unwrap();
        }
        window.close();

        let out = reader.await.unwrap().unwrap();
        assert_eq!(out, data);
    }
}
