//! Progressive chunk assembly.
//!
//! Sits between a decode session and a consumer that applies chunks
//! at its own pace (typically a renderer rebuilding a GPU buffer).
//! The first chunk of a decode is always released immediately so
//! something is visible as early as possible; afterwards, chunks
//! arriving while the consumer is busy are coalesced and held for a
//! bounded window before being force-flushed.

use crate::events::PointChunk;
use crate::schedule::{Clock, SystemClock};
use std::time::{Duration, Instant};

/// Buffers chunks while the consumer is busy and releases them in
/// arrival order, never holding any chunk longer than the hold window.
pub struct ChunkAssembler {
    clock: Box<dyn Clock + Send>,
    hold: Duration,
    buffered: Vec<PointChunk>,
    held_since: Option<Instant>,
    busy: bool,
    delivered_any: bool,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::with_clock(
            Box::new(SystemClock),
            Duration::from_millis(constants::ASSEMBLER_HOLD_MS),
        )
    }

    pub fn with_clock(clock: Box<dyn Clock + Send>, hold: Duration) -> Self {
        Self {
            clock,
            hold,
            buffered: Vec::new(),
            held_since: None,
            busy: false,
            delivered_any: false,
        }
    }

    /// Reset for a fresh decode. Anything still buffered belongs to a
    /// superseded session and is dropped.
    pub fn begin_decode(&mut self) {
        self.buffered.clear();
        self.held_since = None;
        self.delivered_any = false;
    }

    /// Consumer back-pressure signal. While busy, incoming chunks are
    /// held rather than released.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn pending(&self) -> usize {
        self.buffered.len()
    }

    /// Accept one decoded chunk, returning whatever is due for
    /// delivery right now (possibly nothing).
    pub fn push(&mut self, chunk: PointChunk) -> Vec<PointChunk> {
        // The first chunk of a decode bypasses the hold entirely.
        if !self.delivered_any {
            self.delivered_any = true;
            let mut due = std::mem::take(&mut self.buffered);
            due.push(chunk);
            self.held_since = None;
            return due;
        }

        self.buffered.push(chunk);
        if self.held_since.is_none() {
            self.held_since = Some(self.clock.now());
        }
        self.release_if_due()
    }

    /// Poll for buffered chunks whose hold window has elapsed, or that
    /// a now-idle consumer can take.
    pub fn poll(&mut self) -> Vec<PointChunk> {
        self.release_if_due()
    }

    fn release_if_due(&mut self) -> Vec<PointChunk> {
        if self.buffered.is_empty() {
            return Vec::new();
        }
        let overdue = self
            .held_since
            .is_some_and(|since| self.clock.now().duration_since(since) >= self.hold);
        if self.busy && !overdue {
            return Vec::new();
        }
        self.held_since = None;
        std::mem::take(&mut self.buffered)
    }
}

impl Default for ChunkAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use std::sync::Arc;

    fn chunk(points: usize) -> PointChunk {
        PointChunk {
            positions: vec![0.0; points * 3],
            colours: None,
        }
    }

    fn assembler(clock: &Arc<ManualClock>) -> ChunkAssembler {
        ChunkAssembler::with_clock(Box::new(clock.clone()), Duration::from_millis(200))
    }

    #[test]
    fn first_chunk_is_released_immediately() {
        let clock = Arc::new(ManualClock::new());
        let mut assembler = assembler(&clock);
        assembler.begin_decode();
        assembler.set_busy(true);
        let released = assembler.push(chunk(10));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].point_count(), 10);
    }

    #[test]
    fn idle_consumer_drains_in_order() {
        let clock = Arc::new(ManualClock::new());
        let mut assembler = assembler(&clock);
        assembler.begin_decode();
        assert_eq!(assembler.push(chunk(1)).len(), 1);
        assert_eq!(assembler.push(chunk(2))[0].point_count(), 2);
        assert_eq!(assembler.push(chunk(3))[0].point_count(), 3);
    }

    #[test]
    fn busy_consumer_holds_until_the_window_elapses() {
        let clock = Arc::new(ManualClock::new());
        let mut assembler = assembler(&clock);
        assembler.begin_decode();
        assembler.push(chunk(1));
        assembler.set_busy(true);

        assert!(assembler.push(chunk(2)).is_empty());
        clock.advance(Duration::from_millis(100));
        assert!(assembler.push(chunk(3)).is_empty());
        assert_eq!(assembler.pending(), 2);

        // The window is measured from the oldest held chunk.
        clock.advance(Duration::from_millis(100));
        let released = assembler.poll();
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].point_count(), 2);
        assert_eq!(released[1].point_count(), 3);
    }

    #[test]
    fn going_idle_releases_held_chunks() {
        let clock = Arc::new(ManualClock::new());
        let mut assembler = assembler(&clock);
        assembler.begin_decode();
        assembler.push(chunk(1));
        assembler.set_busy(true);
        assert!(assembler.push(chunk(2)).is_empty());
        assembler.set_busy(false);
        assert_eq!(assembler.poll().len(), 1);
        assert!(assembler.poll().is_empty());
    }

    #[test]
    fn begin_decode_drops_stale_chunks() {
        let clock = Arc::new(ManualClock::new());
        let mut assembler = assembler(&clock);
        assembler.begin_decode();
        assembler.push(chunk(1));
        assembler.set_busy(true);
        assert!(assembler.push(chunk(2)).is_empty());

        assembler.begin_decode();
        assert_eq!(assembler.pending(), 0);
        // And the next decode's first chunk is again immediate.
        assert_eq!(assembler.push(chunk(5)).len(), 1);
    }
}
