//! Data-plane capture watcher.
//!
//! A [`CaptureWatcher`] thread polls the instrument for a completed block
//! while the trigger is armed. When one is ready it copies the arm snapshot,
//! releases the instrument lock, hands the snapshot to a [`CaptureSink`], and
//! then re-arms (continuous) or disarms (one-shot). Polls are paced by the
//! poll interval whether or not a block was ready. The lock is only held for
//! the readiness poll and the re-arm, never while the sink runs.

use crate::error::BridgeResult;
use crate::instrument::SharedInstrument;
use crate::state::ArmSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives completed captures.
///
/// # Contract
///
/// - Called on the watcher thread with the instrument lock released.
/// - The snapshot describes the configuration the record was armed with,
///   which may differ from the current state.
pub trait CaptureSink: Send + Sync {
    /// Handle one completed capture
    fn on_capture(&self, snapshot: &ArmSnapshot);
}

/// Sink that only logs each capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl CaptureSink for LoggingSink {
    fn on_capture(&self, snapshot: &ArmSnapshot) {
        let channels = snapshot.channel_enabled.iter().filter(|on| **on).count();
        let pods = snapshot.pod_enabled.iter().filter(|on| **on).count();
        info!(
            depth = snapshot.depth,
            interval_fs = snapshot.interval_fs,
            trigger_sample = snapshot.trigger_sample,
            depth_changed = snapshot.depth_changed,
            channels,
            pods,
            armed_at = %snapshot.captured_at,
            "capture complete"
        );
    }
}

/// Handle to a running watcher thread. Stops the thread on drop.
#[derive(Debug)]
pub struct CaptureWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWatcher {
    /// Start watching `instrument`, polling every `poll_interval`.
    pub fn spawn(
        instrument: SharedInstrument,
        sink: Arc<dyn CaptureSink>,
        poll_interval: Duration,
    ) -> BridgeResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("capture-watcher".to_string())
            .spawn(move || watch(&instrument, sink.as_ref(), poll_interval, &flag))?;
        debug!(?poll_interval, "capture watcher started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("capture watcher panicked");
            }
        }
    }
}

impl Drop for CaptureWatcher {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn watch(
    instrument: &SharedInstrument,
    sink: &dyn CaptureSink,
    poll_interval: Duration,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Acquire) {
        let ready = instrument.lock().poll_capture();
        if let Some(snapshot) = ready {
            sink.on_capture(&snapshot);
            instrument.lock().finish_capture(&snapshot);
        }
        // at most one readiness poll per interval, captured or not
        thread::sleep(poll_interval);
    }
    debug!("capture watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::ChannelKey;
    use crate::hardware::family::Series6000E;
    use crate::hardware::sim::SimulatedScope;
    use crate::instrument::Instrument;
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        captures: Mutex<Vec<ArmSnapshot>>,
    }

    impl CaptureSink for Recorder {
        fn on_capture(&self, snapshot: &ArmSnapshot) {
            self.captures.lock().push(snapshot.clone());
        }
    }

    fn armed_instrument(one_shot: bool) -> SharedInstrument {
        let scope = SimulatedScope::builder(Box::new(Series6000E))
            .auto_complete(true)
            .build();
        let mut inst = Instrument::new(Box::new(scope));
        inst.set_sample_rate(1_250_000_000);
        inst.set_channel_enabled(ChannelKey::Analog(0), true);
        inst.start(one_shot);
        inst.into_shared()
    }

    fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn continuous_mode_keeps_capturing() {
        let instrument = armed_instrument(false);
        let recorder = Arc::new(Recorder::default());
        let watcher = CaptureWatcher::spawn(
            instrument.clone(),
            recorder.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || recorder
            .captures
            .lock()
            .len()
            >= 3));
        watcher.shutdown();
        assert!(instrument.lock().state().trigger.armed);
    }

    #[test]
    fn one_shot_captures_once_then_disarms() {
        let instrument = armed_instrument(true);
        let recorder = Arc::new(Recorder::default());
        let watcher = CaptureWatcher::spawn(
            instrument.clone(),
            recorder.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(5), || !instrument
            .lock()
            .state()
            .trigger
            .armed));
        thread::sleep(Duration::from_millis(20));
        drop(watcher);

        let captures = recorder.captures.lock();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].channel_enabled[0], true);
        assert_eq!(captures[0].interval_fs, 800_000);
    }

    #[test]
    fn idle_instrument_produces_nothing() {
        let scope = SimulatedScope::builder(Box::new(Series6000E))
            .auto_complete(true)
            .build();
        let instrument = Instrument::new(Box::new(scope)).into_shared();
        let recorder = Arc::new(Recorder::default());
        let watcher =
            CaptureWatcher::spawn(instrument, recorder.clone(), Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(20));
        watcher.shutdown();
        assert!(recorder.captures.lock().is_empty());
    }

    #[test]
    fn continuous_capture_is_paced_by_poll_interval() {
        let instrument = armed_instrument(false);
        let recorder = Arc::new(Recorder::default());
        let watcher = CaptureWatcher::spawn(
            instrument.clone(),
            recorder.clone(),
            Duration::from_millis(50),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(300));
        watcher.shutdown();

        // one capture per 50 ms poll at most, with slack for scheduling
        let captured = recorder.captures.lock().len();
        assert!(captured >= 1, "no capture in 300 ms");
        assert!(captured <= 8, "{captured} captures in 300 ms");
        assert!(instrument.lock().state().trigger.armed);
    }
}
