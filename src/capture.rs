//! Trigger and acquisition control.
//!
//! The trigger has three states, tracked by `armed`, `one_shot` and
//! `last_forced` in [`TriggerState`](crate::state::TriggerState):
//!
//! ```text
//!                 start / force (run ok)
//!     Disarmed  ─────────────────────────▶  Armed
//!        ▲                                    │
//!        │ stop, run failure,                 │ capture complete
//!        │ one-shot capture complete          ▼
//!        └──────────────────────────────  (re-arm unless one-shot)
//! ```
//!
//! Any configuration change that touches acquisition goes through
//! [`Instrument::update_trigger`]: push the trigger, then restart the
//! capture if armed so the change takes effect on the next record.

use crate::addressing::ChannelKey;
use crate::hardware::EdgeDirection;
use crate::instrument::{logged, Instrument};
use crate::quantize::{delay_in_samples, split_record, trigger_code};
use crate::state::ArmSnapshot;
use tracing::{debug, trace, warn};

/// Auto-trigger timeout used by a forced trigger, µs.
const FORCED_TIMEOUT_US: u32 = 1;

impl Instrument {
    // =========================================================================
    // Acquisition commands
    // =========================================================================

    /// Arm the trigger. A no-op when already armed or nothing is enabled.
    pub fn start(&mut self, one_shot: bool) {
        if self.state.trigger.armed {
            debug!("ignoring start command, already armed");
            return;
        }
        if !self.state.any_source_enabled() {
            debug!("ignoring start command, no channels enabled");
            return;
        }
        self.start_capture(true, false);
        self.state.trigger.one_shot = one_shot;
    }

    /// Stop acquisition and disarm.
    pub fn stop(&mut self) {
        self.stop_hardware();
        self.state.trigger.one_shot = true;
        self.state.trigger.armed = false;
    }

    /// Capture one record immediately, without waiting for a trigger event.
    pub fn force_trigger(&mut self) {
        if self.state.trigger.armed {
            self.stop_hardware();
            self.state.trigger.armed = false;
        }
        self.push_trigger(true);
        self.start_capture(true, true);
    }

    // =========================================================================
    // Trigger configuration
    // =========================================================================

    /// Select the trigger source, enabling it first if needed.
    pub fn set_trigger_source(&mut self, key: ChannelKey) {
        match key {
            ChannelKey::Analog(index) => {
                if let Some(channel) = self.state.channels.get_mut(index) {
                    if !channel.enabled {
                        debug!(source = %key, "enabling trigger source");
                        channel.enabled = true;
                        self.push_channel(index);
                        self.state.timing.depth_changed = true;
                    }
                }
            }
            ChannelKey::Digital { pod, .. } => {
                if self.state.pods.get(pod).is_some_and(|p| !p.enabled) {
                    debug!(source = %key, "enabling trigger pod");
                    self.set_pod_enabled(pod, true);
                    self.state.timing.depth_changed = true;
                }
            }
            ChannelKey::Auxiliary => {}
        }
        self.state.trigger.source = key;

        let was_armed = self.state.trigger.armed;
        self.stop_hardware();
        self.push_trigger(false);
        if was_armed {
            self.start_capture(false, false);
        }
    }

    /// Trigger level in volts.
    pub fn set_trigger_level(&mut self, volts: f64) {
        self.state.trigger.level = volts;
        self.update_trigger(false);
    }

    /// Trigger edge.
    pub fn set_trigger_direction(&mut self, direction: EdgeDirection) {
        self.state.trigger.direction = direction;
        self.update_trigger(false);
    }

    /// Trigger delay in femtoseconds.
    pub fn set_trigger_delay(&mut self, delay_fs: i64) {
        self.state.trigger.delay_fs = delay_fs;
        self.update_trigger(false);
    }

    /// Push the trigger and restart the capture if armed.
    pub(crate) fn update_trigger(&mut self, force: bool) {
        self.push_trigger(force);
        if self.state.trigger.armed {
            self.start_capture(true, false);
        }
    }

    /// Program the trigger from current state.
    pub(crate) fn push_trigger(&mut self, force: bool) {
        let trigger = &mut self.state.trigger;
        if force {
            trigger.timeout_us = FORCED_TIMEOUT_US;
            trigger.last_forced = true;
            trigger.one_shot = true;
        } else {
            trigger.timeout_us = 0;
            trigger.last_forced = false;
        }

        let interval_fs = self.state.timing.interval_fs;
        if interval_fs == 0 {
            debug!("sample rate not set, trigger not pushed");
            return;
        }

        let trigger = &self.state.trigger;
        let delay = delay_in_samples(trigger.delay_fs, interval_fs);
        // negative delays hold off capture after the trigger event
        let post_trigger_delay = if delay < 0 { delay.unsigned_abs() } else { 0 };

        let (source, direction, timeout_us) = (trigger.source, trigger.direction, trigger.timeout_us);
        match source {
            ChannelKey::Digital { pod, lane } => {
                if force {
                    warn!(source = %source, "forced trigger not available on digital sources");
                }
                logged(
                    "set_trigger_digital",
                    self.driver.set_trigger_digital(pod, lane, direction),
                );
            }
            _ => {
                let Some((range, offset)) = self.state.trigger_frontend(source) else {
                    return;
                };
                let code = trigger_code(
                    self.state.trigger.level,
                    offset,
                    range,
                    self.state.adc_full_scale,
                );
                trace!(source = %source, code, post_trigger_delay, "trigger");
                logged(
                    "set_trigger_simple",
                    self.driver.set_trigger_simple(
                        source,
                        code,
                        direction,
                        post_trigger_delay,
                        timeout_us,
                    ),
                );
            }
        }
    }

    // =========================================================================
    // Arming
    // =========================================================================

    pub(crate) fn stop_hardware(&mut self) {
        logged("stop", self.driver.stop());
    }

    /// Freeze a snapshot and start a block capture.
    ///
    /// Leaves the trigger armed only if the hardware accepted the run.
    pub(crate) fn start_capture(&mut self, stop_first: bool, force: bool) {
        // a previous forced arm left the auto-trigger timeout programmed
        if self.state.trigger.last_forced && !force {
            self.state.trigger.one_shot = false;
            self.stop_hardware();
            self.push_trigger(false);
        }

        let delay = delay_in_samples(self.state.trigger.delay_fs, self.state.timing.interval_fs);
        let (pre, post) = split_record(delay, self.state.timing.depth);
        let snapshot = self.state.take_arm_snapshot(pre);
        debug!(
            pre,
            post,
            depth_changed = snapshot.depth_changed,
            "arming"
        );

        if stop_first {
            self.stop_hardware();
        }

        let timebase = self.state.timing.timebase;
        let result = loop {
            match self.driver.run_block(pre, post, timebase) {
                Err(err) if err.is_transient() => {
                    trace!("previous capture still running, stopping");
                    self.stop_hardware();
                }
                other => break other,
            }
        };

        match result {
            Ok(()) => self.state.trigger.armed = true,
            Err(err) => {
                warn!(code = err.code(), error = %err, "failed to start capture");
                self.state.trigger.armed = false;
            }
        }
    }

    // =========================================================================
    // Data plane hooks
    // =========================================================================

    /// Snapshot of a completed capture, if one is waiting.
    pub fn poll_capture(&mut self) -> Option<ArmSnapshot> {
        if !self.state.trigger.armed {
            return None;
        }
        match self.driver.is_ready() {
            Ok(true) => self.state.snapshot.clone(),
            Ok(false) => None,
            Err(err) => {
                warn!(code = err.code(), error = %err, "readiness poll failed");
                None
            }
        }
    }

    /// Re-arm (or disarm, for one-shot) after a capture was handed off.
    ///
    /// Ignored when the instrument was re-armed or stopped in between.
    pub fn finish_capture(&mut self, handled: &ArmSnapshot) {
        if !self.state.trigger.armed {
            return;
        }
        let current = self.state.snapshot.as_ref().map(|s| s.captured_at);
        if current != Some(handled.captured_at) {
            trace!("capture superseded by a newer arm");
            return;
        }
        if self.state.trigger.one_shot {
            self.state.trigger.armed = false;
        } else {
            self.start_capture(true, false);
        }
    }
}
