//! Read-back backends that copy a sample batch back to the CPU
//!
//! A backend either completes asynchronously, polled once per update, or
//! reports that it has no async path and the sampler reads synchronously.

use crate::core_types::Texel;

/// State of an in-flight read-back
#[derive(Debug, Clone, PartialEq)]
pub enum ReadbackStatus {
    Pending,
    Ready(Vec<Texel>),
    /// The request errored; the sampler falls back to a synchronous read
    Failed,
}

/// Transfer path for sample batches
pub trait ReadbackBackend: Send {
    /// Whether [`request`](Self::request) and [`poll`](Self::poll) are usable
    fn supports_async(&self) -> bool;

    /// Start reading back a batch
    fn request(&mut self, batch: Vec<Texel>);

    /// Check on the last request
    fn poll(&mut self) -> ReadbackStatus;

    fn name(&self) -> &'static str;
}

/// Completes on the first poll
#[derive(Debug, Default)]
pub struct ImmediateReadback {
    batch: Option<Vec<Texel>>,
}

impl ReadbackBackend for ImmediateReadback {
    fn supports_async(&self) -> bool {
        true
    }

    fn request(&mut self, batch: Vec<Texel>) {
        self.batch = Some(batch);
    }

    fn poll(&mut self) -> ReadbackStatus {
        self.batch.take().map_or(ReadbackStatus::Pending, ReadbackStatus::Ready)
    }

    fn name(&self) -> &'static str {
        "Immediate"
    }
}

/// Completes after a fixed number of pending polls
#[derive(Debug)]
pub struct LatencyReadback {
    latency: u32,
    remaining: u32,
    batch: Option<Vec<Texel>>,
}

impl LatencyReadback {
    #[must_use]
    pub fn new(latency: u32) -> Self {
        Self {
            latency,
            remaining: 0,
            batch: None,
        }
    }
}

impl ReadbackBackend for LatencyReadback {
    fn supports_async(&self) -> bool {
        true
    }

    fn request(&mut self, batch: Vec<Texel>) {
        self.batch = Some(batch);
        self.remaining = self.latency;
    }

    fn poll(&mut self) -> ReadbackStatus {
        if self.batch.is_none() {
            return ReadbackStatus::Pending;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return ReadbackStatus::Pending;
        }
        self.batch.take().map_or(ReadbackStatus::Pending, ReadbackStatus::Ready)
    }

    fn name(&self) -> &'static str {
        "Latency"
    }
}

/// Errors every request
#[derive(Debug, Default)]
pub struct FailingReadback;

impl ReadbackBackend for FailingReadback {
    fn supports_async(&self) -> bool {
        true
    }

    fn request(&mut self, _batch: Vec<Texel>) {}

    fn poll(&mut self) -> ReadbackStatus {
        ReadbackStatus::Failed
    }

    fn name(&self) -> &'static str {
        "Failing"
    }
}

/// No async path; every batch is read synchronously
#[derive(Debug, Default)]
pub struct UnsupportedReadback;

impl ReadbackBackend for UnsupportedReadback {
    fn supports_async(&self) -> bool {
        false
    }

    fn request(&mut self, _batch: Vec<Texel>) {}

    fn poll(&mut self) -> ReadbackStatus {
        ReadbackStatus::Failed
    }

    fn name(&self) -> &'static str {
        "Unsupported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_counts_polls() {
        let mut backend = LatencyReadback::new(2);
        assert_eq!(backend.poll(), ReadbackStatus::Pending);
        backend.request(vec![Texel::zeros()]);
        assert_eq!(backend.poll(), ReadbackStatus::Pending);
        assert_eq!(backend.poll(), ReadbackStatus::Pending);
        assert_eq!(backend.poll(), ReadbackStatus::Ready(vec![Texel::zeros()]));
    }

    #[test]
    fn test_immediate_ready_once() {
        let mut backend = ImmediateReadback::default();
        backend.request(vec![Texel::zeros(); 2]);
        assert!(matches!(backend.poll(), ReadbackStatus::Ready(batch) if batch.len() == 2));
        assert_eq!(backend.poll(), ReadbackStatus::Pending);
    }
}
