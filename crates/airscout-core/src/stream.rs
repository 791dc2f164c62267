//! Byte sources consumed by the frame decoder
//!
//! The decoder only ever needs three things from its I/O collaborator: how many
//! bytes are buffered, a non-destructive look at the head, and a way to advance
//! past bytes it has dealt with. [`ByteStream`] captures exactly that.
//!
//! Two implementations are provided:
//!
//! - [`SliceStream`]: a cursor over a borrowed slice, for fixtures and replaying
//!   captured serial logs.
//! - [`RingStream`]: a fixed-capacity FIFO on top of `heapless::Deque` that is fed
//!   from any `embedded_io` reader (typically a UART) without blocking.

use embedded_io::{Read, ReadReady};
use heapless::Deque;
use thiserror_no_std::Error;

/// Error types for byte stream operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Fewer bytes are buffered than were requested
    #[error("Insufficient data (requested: {requested}, available: {available})")]
    Insufficient {
        /// Number of bytes requested
        requested: usize,
        /// Number of bytes currently buffered
        available: usize,
    },

    /// The stream buffer is full
    #[error("Stream buffer overflow (capacity: {capacity})")]
    Overflow {
        /// Buffer capacity in bytes
        capacity: usize,
    },

    /// The underlying reader reported an error
    #[error("Byte source read failed")]
    Source,
}

/// Ordered source of bytes with peek/consume semantics.
///
/// Implementations must leave the read cursor untouched whenever an operation
/// fails. Bytes are never pushed back once consumed.
pub trait ByteStream {
    /// Number of bytes that can be peeked or consumed right now.
    fn available(&self) -> usize;

    /// Copy the next `out.len()` bytes into `out` without advancing.
    fn peek(&self, out: &mut [u8]) -> Result<(), StreamError>;

    /// Copy the next `out.len()` bytes into `out` and advance past them.
    fn consume(&mut self, out: &mut [u8]) -> Result<(), StreamError>;

    /// Advance past `count` bytes without copying them.
    fn skip(&mut self, count: usize) -> Result<(), StreamError>;
}

fn check_available(requested: usize, available: usize) -> Result<(), StreamError> {
    if requested > available {
        return Err(StreamError::Insufficient {
            requested,
            available,
        });
    }
    Ok(())
}

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceStream<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceStream<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Total number of bytes consumed so far.
    pub const fn position(&self) -> usize {
        self.position
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

impl ByteStream for SliceStream<'_> {
    fn available(&self) -> usize {
        self.data.len() - self.position
    }

    fn peek(&self, out: &mut [u8]) -> Result<(), StreamError> {
        check_available(out.len(), self.available())?;
        out.copy_from_slice(&self.remaining()[..out.len()]);
        Ok(())
    }

    fn consume(&mut self, out: &mut [u8]) -> Result<(), StreamError> {
        self.peek(out)?;
        self.position += out.len();
        Ok(())
    }

    fn skip(&mut self, count: usize) -> Result<(), StreamError> {
        check_available(count, self.available())?;
        self.position += count;
        Ok(())
    }
}

/// Fixed-capacity byte FIFO fed from a serial peripheral.
///
/// The producer side (`push`, `extend_from_slice`, `fill_from`) and the consumer
/// side ([`ByteStream`]) are meant to be driven from the same polling loop. If an
/// interrupt handler feeds the buffer instead, wrap it in a mutex at the call site.
///
/// # Example
///
/// ```ignore
/// let mut stream: RingStream<128> = RingStream::new();
/// loop {
///     stream.fill_from(&mut uart)?;
///     if let Some(frame) = decoder.try_decode_frame(&mut stream) {
///         // hand off to the aggregator
///     }
///     Timer::after_millis(SAMPLE_INTERVAL_MS).await;
/// }
/// ```
pub struct RingStream<const N: usize> {
    buffer: Deque<u8, N>,
}

impl<const N: usize> Default for RingStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingStream<N> {
    pub const fn new() -> Self {
        Self {
            buffer: Deque::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Append one byte at the tail.
    pub fn push(&mut self, byte: u8) -> Result<(), StreamError> {
        self.buffer
            .push_back(byte)
            .map_err(|_| StreamError::Overflow { capacity: N })
    }

    /// Append as many bytes of `bytes` as fit, returning how many were taken.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let mut taken = 0;
        for &byte in bytes {
            if self.buffer.push_back(byte).is_err() {
                break;
            }
            taken += 1;
        }
        taken
    }

    /// Drain `reader` into the buffer while it reports data ready.
    ///
    /// Never blocks: a reader that is not ready leaves the buffer as is. Stops
    /// once the buffer is full so unread bytes stay in the peripheral FIFO.
    /// Returns the number of bytes appended.
    pub fn fill_from<R>(&mut self, reader: &mut R) -> Result<usize, StreamError>
    where
        R: Read + ReadReady,
    {
        let mut chunk = [0u8; 32];
        let mut appended = 0;

        while !self.is_full() {
            let ready = reader.read_ready().map_err(|e| {
                log::error!("Byte source readiness check failed: {:?}", e);
                StreamError::Source
            })?;
            if !ready {
                break;
            }

            let room = (N - self.buffer.len()).min(chunk.len());
            let read = reader.read(&mut chunk[..room]).map_err(|e| {
                log::error!("Byte source read failed: {:?}", e);
                StreamError::Source
            })?;
            if read == 0 {
                break;
            }

            appended += self.extend_from_slice(&chunk[..read]);
        }

        Ok(appended)
    }
}

impl<const N: usize> ByteStream for RingStream<N> {
    fn available(&self) -> usize {
        self.buffer.len()
    }

    fn peek(&self, out: &mut [u8]) -> Result<(), StreamError> {
        check_available(out.len(), self.available())?;
        for (slot, &byte) in out.iter_mut().zip(self.buffer.iter()) {
            *slot = byte;
        }
        Ok(())
    }

    fn consume(&mut self, out: &mut [u8]) -> Result<(), StreamError> {
        check_available(out.len(), self.available())?;
        for slot in out.iter_mut() {
            // Length was checked above, so the deque cannot run dry here.
            *slot = self.buffer.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn skip(&mut self, count: usize) -> Result<(), StreamError> {
        check_available(count, self.available())?;
        for _ in 0..count {
            self.buffer.pop_front();
        }
        Ok(())
    }
}
