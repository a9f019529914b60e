//! Ordered queue of decoded frames awaiting presentation.
//!
//! The buffered time span (newest minus oldest timestamp) drives decoder
//! backpressure with hysteresis: decoding pauses once the span reaches the
//! configured maximum and resumes only after it falls below half of it. The
//! maximum is a trigger, not a cap; the queue may briefly exceed it.

use bytes::Bytes;
use std::collections::VecDeque;

use crate::types::{Frame, FrameKind};

/// Default capacity hint for the queue.
const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    max_span: f64,
    next_arrival: u64,
    stats: FrameBufferStats,
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameBufferStats {
    pub pushed: u64,
    pub presented: u64,
    pub cleared: u64,
}

impl FrameBuffer {
    pub fn new(max_span: f64) -> Self {
        Self {
            frames: VecDeque::with_capacity(DEFAULT_CAPACITY),
            max_span,
            next_arrival: 0,
            stats: FrameBufferStats::default(),
        }
    }

    /// Appends a frame in arrival order and returns its arrival number.
    pub fn push(&mut self, kind: FrameKind, timestamp: f64, payload: Bytes) -> u64 {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.frames.push_back(Frame {
            kind,
            timestamp,
            payload,
            arrival,
        });
        self.stats.pushed += 1;
        arrival
    }

    pub fn peek(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Removes the head frame after it was presented.
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.stats.presented += 1;
        }
        frame
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drops every buffered frame.
    pub fn clear(&mut self) {
        self.stats.cleared += self.frames.len() as u64;
        self.frames.clear();
    }

    /// Seconds between the oldest and the newest buffered frame.
    pub fn span(&self) -> f64 {
        match (self.frames.front(), self.frames.back()) {
            (Some(oldest), Some(newest)) => newest.timestamp - oldest.timestamp,
            _ => 0.0,
        }
    }

    /// Span reached the maximum: decoding should pause.
    pub fn is_full(&self) -> bool {
        self.span() >= self.max_span
    }

    /// Span fell below half the maximum: decoding may resume.
    pub fn has_room(&self) -> bool {
        self.span() < self.max_span / 2.0
    }

    pub fn stats(&self) -> FrameBufferStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(timestamps: &[f64]) -> FrameBuffer {
        let mut buffer = FrameBuffer::new(1.0);
        for &ts in timestamps {
            buffer.push(FrameKind::Video, ts, Bytes::new());
        }
        buffer
    }

    #[test]
    fn test_fifo_order_and_arrival() {
        let mut buffer = filled(&[0.0, 0.04]);
        assert_eq!(buffer.peek().unwrap().arrival, 0);
        assert_eq!(buffer.pop().unwrap().timestamp, 0.0);
        assert_eq!(buffer.pop().unwrap().arrival, 1);
        assert!(buffer.pop().is_none());
        assert_eq!(buffer.stats().presented, 2);
    }

    #[test]
    fn test_span_thresholds() {
        let buffer = filled(&[0.0]);
        assert_eq!(buffer.span(), 0.0);
        assert!(buffer.has_room());

        let buffer = filled(&[2.0, 2.6]);
        assert!(!buffer.is_full());
        assert!(!buffer.has_room());

        let buffer = filled(&[2.0, 3.0]);
        assert!(buffer.is_full());
    }

    #[test]
    fn test_clear_counts_dropped_frames() {
        let mut buffer = filled(&[0.0, 0.1, 0.2]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.stats().cleared, 3);
        assert_eq!(buffer.span(), 0.0);
    }
}
