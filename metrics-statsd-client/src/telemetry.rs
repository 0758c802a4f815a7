use std::sync::atomic::{AtomicU64, Ordering};

/// Client telemetry.
///
/// `Telemetry` tracks what happened to every action handed to the client, from the moment it is enqueued until its
/// payload is sent (or not).
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    actions_enqueued: AtomicU64,
    actions_dropped: AtomicU64,
    actions_sampled_out: AtomicU64,
    actions_rejected: AtomicU64,
    packets_sent: AtomicU64,
    packets_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_dropped: AtomicU64,
}

impl Telemetry {
    pub fn track_enqueued(&self) {
        self.actions_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_queue_full(&self) {
        self.actions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_sampled_out(&self) {
        self.actions_sampled_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_encode_failed(&self) {
        self.actions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_packet_send_succeeded(&self, len: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn track_packet_send_failed(&self, len: usize) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
        self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            actions_enqueued: self.actions_enqueued.load(Ordering::Relaxed),
            actions_dropped: self.actions_dropped.load(Ordering::Relaxed),
            actions_sampled_out: self.actions_sampled_out.load(Ordering::Relaxed),
            actions_rejected: self.actions_rejected.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a client's telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Actions accepted into the queue.
    pub actions_enqueued: u64,

    /// Actions dropped because the queue was full.
    pub actions_dropped: u64,

    /// Actions skipped by sampling.
    pub actions_sampled_out: u64,

    /// Actions whose value could not be encoded.
    pub actions_rejected: u64,

    /// Payloads handed to the transport successfully.
    pub packets_sent: u64,

    /// Payloads the transport failed to send.
    pub packets_dropped: u64,

    /// Bytes handed to the transport successfully.
    pub bytes_sent: u64,

    /// Bytes in payloads the transport failed to send.
    pub bytes_dropped: u64,
}
