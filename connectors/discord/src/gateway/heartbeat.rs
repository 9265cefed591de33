//! Gateway keep-alive.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use rand::Rng;
use serde_json::json;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};

use super::{FrameSink, GatewayOpcode};
use crate::{error::DiscordResult, types::GatewayPayload};

/// Heartbeat emitter for one connection.
///
/// Every beat carries the next value of a counter that starts at 0 and is
/// never reset.
pub struct Heartbeat {
    sink: Arc<dyn FrameSink>,
    sequence: Mutex<u64>,
    acked: AtomicBool,
}

impl Heartbeat {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            sequence: Mutex::new(0),
            acked: AtomicBool::new(true),
        }
    }

    /// Send `{op: 1, d: n}` and return `n`.
    ///
    /// Warns when the previous beat was never acknowledged, but sends anyway.
    /// A beat that fails to send leaves the counter and the ack state as
    /// they were.
    pub fn beat(&self) -> DiscordResult<u64> {
        let mut sequence = self.sequence.lock();
        let n = *sequence;
        self.sink
            .send_frame(&GatewayPayload::outgoing(GatewayOpcode::Heartbeat, json!(n)))?;
        *sequence += 1;

        if !self.acked.swap(false, Ordering::AcqRel) {
            warn!("Heartbeat not acknowledged, connection may be zombied");
        }
        debug!(sequence = n, "Sent heartbeat");
        Ok(n)
    }

    /// Record a heartbeat ACK.
    pub fn acknowledge(&self) {
        self.acked.store(true, Ordering::Release);
        debug!("Heartbeat acknowledged");
    }

    /// Whether the last beat has been acknowledged.
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acked.load(Ordering::Acquire)
    }

    /// The value the next beat will carry.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        *self.sequence.lock()
    }
}

/// When heartbeats go out relative to the server's interval.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatTiming {
    /// Subtracted from the server interval
    pub margin_ms: u64,
    /// Exclusive upper bound of the delay before the first beat
    pub jitter_ms: u64,
}

impl HeartbeatTiming {
    /// Beat period for a server interval. Falls back to the full interval
    /// when the margin would eat all of it.
    #[must_use]
    pub fn period(&self, interval_ms: u64) -> Duration {
        let ms = interval_ms
            .checked_sub(self.margin_ms)
            .filter(|ms| *ms > 0)
            .unwrap_or(interval_ms)
            .max(1);
        Duration::from_millis(ms)
    }

    /// Random delay in `[0, jitter_ms)`.
    #[must_use]
    pub fn first_delay(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..self.jitter_ms))
    }
}

/// Background task beating on a fixed period. Stops when dropped or when a
/// beat can no longer be sent.
pub struct HeartbeatScheduler {
    task: JoinHandle<()>,
}

impl HeartbeatScheduler {
    pub fn spawn(heartbeat: Arc<Heartbeat>, interval_ms: u64, timing: HeartbeatTiming) -> Self {
        let first = timing.first_delay();
        let period = timing.period(interval_ms);
        debug!(
            interval_ms,
            first = ?first,
            period = ?period,
            "Scheduling heartbeats"
        );

        let task = tokio::spawn(async move {
            time::sleep(first).await;
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately.
                ticker.tick().await;
                if let Err(e) = heartbeat.beat() {
                    debug!(error = %e, "Stopping heartbeats");
                    break;
                }
            }
        });

        Self { task }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::RecordingSink;

    fn sequences(sink: &RecordingSink) -> Vec<u64> {
        sink.frames()
            .iter()
            .map(|frame| {
                assert_eq!(frame["op"], 1);
                frame["d"].as_u64().unwrap()
            })
            .collect()
    }

    #[test]
    fn sequence_starts_at_zero_and_increases() {
        let sink = Arc::new(RecordingSink::default());
        let heartbeat = Heartbeat::new(sink.clone());

        assert_eq!(heartbeat.beat().unwrap(), 0);
        assert_eq!(heartbeat.beat().unwrap(), 1);
        assert_eq!(heartbeat.beat().unwrap(), 2);
        assert_eq!(sequences(&sink), vec![0, 1, 2]);
        assert_eq!(heartbeat.next_sequence(), 3);
    }

    #[test]
    fn ack_is_tracked_per_beat() {
        let heartbeat = Heartbeat::new(Arc::new(RecordingSink::default()));
        assert!(heartbeat.is_acknowledged());

        heartbeat.beat().unwrap();
        assert!(!heartbeat.is_acknowledged());

        heartbeat.acknowledge();
        assert!(heartbeat.is_acknowledged());
    }

    #[test]
    fn failed_send_keeps_counter_and_ack() {
        let sink = Arc::new(RecordingSink::default());
        let heartbeat = Heartbeat::new(sink.clone());
        assert_eq!(heartbeat.beat().unwrap(), 0);
        heartbeat.acknowledge();

        sink.close(1000, "test");
        assert!(heartbeat.beat().is_err());
        assert_eq!(heartbeat.next_sequence(), 1);
        assert!(heartbeat.is_acknowledged());
    }

    #[test]
    fn period_subtracts_margin() {
        let timing = HeartbeatTiming {
            margin_ms: 5_000,
            jitter_ms: 100,
        };
        assert_eq!(timing.period(41_250), Duration::from_millis(36_250));
        assert_eq!(timing.period(3_000), Duration::from_millis(3_000));
        assert_eq!(timing.period(5_000), Duration::from_millis(5_000));
        assert!(timing.first_delay() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_beats_after_jitter_then_every_period() {
        let sink = Arc::new(RecordingSink::default());
        let heartbeat = Arc::new(Heartbeat::new(sink.clone()));
        let timing = HeartbeatTiming {
            margin_ms: 5_000,
            jitter_ms: 100,
        };

        let _scheduler = HeartbeatScheduler::spawn(Arc::clone(&heartbeat), 41_250, timing);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sequences(&sink), vec![0]);

        time::sleep(Duration::from_millis(36_000)).await;
        assert_eq!(sequences(&sink), vec![0]);

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(sequences(&sink), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_stops_once_sink_is_closed() {
        let sink = Arc::new(RecordingSink::default());
        let heartbeat = Arc::new(Heartbeat::new(sink.clone()));
        let timing = HeartbeatTiming {
            margin_ms: 0,
            jitter_ms: 0,
        };

        let scheduler = HeartbeatScheduler::spawn(heartbeat, 1_000, timing);
        time::sleep(Duration::from_millis(10)).await;
        sink.close(1000, "test");
        time::sleep(Duration::from_millis(1_000)).await;

        assert!(scheduler.is_finished());
        assert_eq!(sequences(&sink), vec![0]);
    }
}
