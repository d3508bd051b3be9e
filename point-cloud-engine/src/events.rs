//! Decode event stream and sinks.
//!
//! A session emits, in order: one `Hash`, then progress and chunk
//! events in point-index order, then exactly one terminal (`Done`,
//! `Error`, or `Skip`) — or nothing further at all when aborted.
//! Every event is moved into the sink; the engine never retains or
//! mutates a chunk after emission.

use crate::error::DecodeError;
use crate::schedule::{CancelToken, Clock, Scheduler, SystemClock};
use std::time::{Duration, Instant};

/// One decoded batch: positions in world units, colours normalised to
/// [0, 1], three scalars per point each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointChunk {
    pub positions: Vec<f32>,
    pub colours: Option<Vec<f32>>,
}

impl PointChunk {
    pub fn point_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Positions as raw bytes, for direct GPU buffer upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Colours as raw bytes, when present.
    pub fn colour_bytes(&self) -> Option<&[u8]> {
        self.colours.as_deref().map(bytemuck::cast_slice)
    }
}

/// Periodic progress snapshot for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    pub total_points: u64,
    pub processed_points: u64,
    pub accepted_points: u64,
    pub sample_every: u64,
}

/// Final counts reported by a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub total_points: u64,
    pub processed_points: u64,
    pub accepted_points: u64,
    pub sample_every: u64,
}

/// Terminal payload of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSummary {
    pub total_points: u64,
    pub accepted_points: u64,
    pub sample_every: u64,
    pub hash: String,
}

/// Everything a session can tell its consumer.
#[derive(Debug)]
pub enum DecodeEvent {
    /// Content hash of the submitted bytes, known before decoding.
    Hash(String),
    Progress(DecodeProgress),
    /// Ownership of the chunk buffers transfers to the consumer.
    Chunk(PointChunk),
    Done(DecodeSummary),
    /// The content hash matched the previous completed session; no
    /// decoding was performed.
    Skip(String),
    Error(String),
}

/// Destination for session events. Implemented for any `FnMut`, so
/// the same decoder logic runs inline over a callback or across a
/// worker boundary through a closure that owns a channel sender.
pub trait EventSink {
    fn emit(&mut self, event: DecodeEvent);
}

impl<F: FnMut(DecodeEvent)> EventSink for F {
    fn emit(&mut self, event: DecodeEvent) {
        self(event)
    }
}

/// Rate limiter for progress events.
pub struct ProgressThrottle {
    clock: Box<dyn Clock + Send>,
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::with_clock(
            Box::new(SystemClock),
            Duration::from_millis(constants::PROGRESS_INTERVAL_MS),
        )
    }

    pub fn with_clock(clock: Box<dyn Clock + Send>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            last: None,
        }
    }

    /// True when enough time has passed to emit another progress event.
    pub fn ready(&mut self) -> bool {
        let now = self.clock.now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable decode-side context threaded through a decoder run.
pub struct DecodeCtx<'a> {
    pub sink: &'a mut dyn EventSink,
    pub scheduler: &'a mut dyn Scheduler,
    pub cancel: &'a CancelToken,
    pub throttle: &'a mut ProgressThrottle,
}

impl DecodeCtx<'_> {
    /// Fail with `Cancelled` as soon as an abort has been observed.
    pub fn check_cancelled(&self) -> crate::error::Result<()> {
        if self.cancel.is_cancelled() {
            Err(DecodeError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn checkpoint(&mut self) {
        self.scheduler.yield_if_budget_exceeded();
    }

    pub fn emit_chunk(&mut self, chunk: PointChunk) {
        if chunk.point_count() > 0 {
            self.sink.emit(DecodeEvent::Chunk(chunk));
        }
    }

    /// Emit a progress event, subject to the throttle.
    pub fn emit_progress(&mut self, progress: DecodeProgress) {
        if self.throttle.ready() {
            self.sink.emit(DecodeEvent::Progress(progress));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use std::sync::Arc;

    #[test]
    fn chunk_byte_views_share_length() {
        let chunk = PointChunk {
            positions: vec![1.0, 2.0, 3.0],
            colours: Some(vec![0.5, 0.5, 0.5]),
        };
        assert_eq!(chunk.point_count(), 1);
        assert_eq!(chunk.position_bytes().len(), 12);
        assert_eq!(chunk.colour_bytes().unwrap().len(), 12);
    }

    #[test]
    fn progress_throttle_limits_rate() {
        let clock = Arc::new(ManualClock::new());
        let mut throttle =
            ProgressThrottle::with_clock(Box::new(clock.clone()), Duration::from_millis(80));
        assert!(throttle.ready());
        assert!(!throttle.ready());
        clock.advance(Duration::from_millis(79));
        assert!(!throttle.ready());
        clock.advance(Duration::from_millis(1));
        assert!(throttle.ready());
    }
}
