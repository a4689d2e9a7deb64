// Live-mutable control state shared between the control surface and the pipeline
//
// Every scalar is stored in its own atomic (f32 bits in an AtomicU32). A
// sequence counter makes multi-field updates (reset, bulk gain changes)
// appear all-or-nothing to readers: the counter is odd while a write is in
// flight and readers retry until they see the same even value on both sides
// of their reads. Writers are serialized by a mutex; readers never block.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::audio::errors::ControlError;
use crate::audio::types::GainVector;
use crate::types::{MAX_BAND_GAIN_DB, MAX_MASTER_VOLUME, MIN_BAND_GAIN_DB};

/// Consistent copy of the control values taken once per cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub gains: GainVector,
    pub master_volume: f32,
    pub version: u64,
}

pub struct ControlState {
    gains: Box<[AtomicU32]>,
    master_volume: AtomicU32,
    sequence: AtomicU64,
    write_lock: Mutex<()>,
}

impl ControlState {
    /// All bands start at 0 dB
    pub fn new(band_count: usize, initial_volume: f32) -> Self {
        let gains = (0..band_count)
            .map(|_| AtomicU32::new(0.0_f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let volume = if initial_volume.is_finite() {
            initial_volume.clamp(0.0, MAX_MASTER_VOLUME)
        } else {
            1.0
        };

        Self {
            gains,
            master_volume: AtomicU32::new(volume.to_bits()),
            sequence: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn band_count(&self) -> usize {
        self.gains.len()
    }

    /// Set one band's gain; the value is clamped to the slider range and the
    /// applied value is returned.
    pub fn set_band_gain(&self, band_index: usize, gain_db: f32) -> Result<f32, ControlError> {
        if band_index >= self.gains.len() {
            return Err(ControlError::BandIndexOutOfRange {
                index: band_index,
                bands: self.gains.len(),
            });
        }
        if !gain_db.is_finite() {
            return Err(ControlError::NonFinite {
                parameter: "band gain",
            });
        }

        let applied = gain_db.clamp(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
        self.write(|state| state.gains[band_index].store(applied.to_bits(), Ordering::Relaxed));
        Ok(applied)
    }

    /// Replace every band gain in one update
    pub fn set_gains(&self, gains_db: &[f32]) -> Result<(), ControlError> {
        if gains_db.len() != self.gains.len() {
            return Err(ControlError::GainCountMismatch {
                gains: gains_db.len(),
                bands: self.gains.len(),
            });
        }
        if gains_db.iter().any(|gain| !gain.is_finite()) {
            return Err(ControlError::NonFinite {
                parameter: "band gain",
            });
        }

        self.write(|state| {
            for (slot, gain) in state.gains.iter().zip(gains_db) {
                let applied = gain.clamp(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
                slot.store(applied.to_bits(), Ordering::Relaxed);
            }
        });
        Ok(())
    }

    /// Flatten the equalizer back to 0 dB on every band
    pub fn reset_gains(&self) {
        self.write(|state| {
            for slot in state.gains.iter() {
                slot.store(0.0_f32.to_bits(), Ordering::Relaxed);
            }
        });
    }

    /// Set master volume as a linear fraction (1.0 = 100%), clamped to [0, 2]
    pub fn set_master_volume(&self, fraction: f32) -> Result<f32, ControlError> {
        if !fraction.is_finite() {
            return Err(ControlError::NonFinite {
                parameter: "master volume",
            });
        }

        let applied = fraction.clamp(0.0, MAX_MASTER_VOLUME);
        self.write(|state| {
            state
                .master_volume
                .store(applied.to_bits(), Ordering::Relaxed)
        });
        Ok(applied)
    }

    pub fn band_gain(&self, band_index: usize) -> Option<f32> {
        self.gains
            .get(band_index)
            .map(|slot| f32::from_bits(slot.load(Ordering::Acquire)))
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Acquire))
    }

    pub fn gains(&self) -> GainVector {
        self.snapshot().gains
    }

    pub fn version(&self) -> u64 {
        self.sequence.load(Ordering::Acquire) / 2
    }

    /// Read every value without tearing across a concurrent multi-field write
    pub fn snapshot(&self) -> ControlSnapshot {
        let mut gains = Vec::with_capacity(self.gains.len());
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before % 2 == 1 {
                std::hint::spin_loop();
                continue;
            }

            gains.clear();
            gains.extend(
                self.gains
                    .iter()
                    .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed))),
            );
            let master_volume = f32::from_bits(self.master_volume.load(Ordering::Relaxed));

            fence(Ordering::Acquire);
            if self.sequence.load(Ordering::Relaxed) == before {
                return ControlSnapshot {
                    gains,
                    master_volume,
                    version: before / 2,
                };
            }
            std::hint::spin_loop();
        }
    }

    fn write<F: FnOnce(&Self)>(&self, update: F) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let start = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(start + 1, Ordering::Relaxed);
        fence(Ordering::Release);
        update(self);
        self.sequence.store(start + 2, Ordering::Release);
    }
}

impl std::fmt::Debug for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ControlState")
            .field("gains", &snapshot.gains)
            .field("master_volume", &snapshot.master_volume)
            .field("version", &snapshot.version)
            .finish()
    }
}

/// Pipeline lifecycle phase: `Idle -> Running -> Stopping -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PipelinePhase {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl PipelinePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelinePhase::Running,
            2 => PipelinePhase::Stopping,
            _ => PipelinePhase::Idle,
        }
    }
}

/// Run flags shared by the capture loop, the playback loop and whoever
/// requests shutdown. Checked once per loop iteration.
#[derive(Debug)]
pub struct RunState {
    running: AtomicBool,
    stop_requested: AtomicBool,
    phase: AtomicU8,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            phase: AtomicU8::new(PipelinePhase::Idle as u8),
        }
    }

    pub fn mark_running(&self) {
        self.stop_requested.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        self.phase.store(PipelinePhase::Running as u8, Ordering::Release);
    }

    /// Ask both loops to finish their current cycle and exit
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        if self.running.load(Ordering::Acquire) {
            self.phase.store(PipelinePhase::Stopping as u8, Ordering::Release);
        }
    }

    pub fn mark_idle(&self) {
        self.running.store(false, Ordering::Release);
        self.phase.store(PipelinePhase::Idle as u8, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// True while the loops should keep cycling
    pub fn should_continue(&self) -> bool {
        self.is_running() && !self.stop_requested()
    }

    pub fn phase(&self) -> PipelinePhase {
        PipelinePhase::from_u8(self.phase.load(Ordering::Acquire))
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_advances_once_per_write() {
        let control = ControlState::new(3, 1.0);
        assert_eq!(control.version(), 0);

        control.set_band_gain(0, 3.0).unwrap();
        control.reset_gains();
        control.set_master_volume(0.5).unwrap();
        assert_eq!(control.version(), 3);
        assert_eq!(control.snapshot().version, 3);
    }

    #[test]
    fn test_run_state_phases() {
        let run_state = RunState::new();
        assert_eq!(run_state.phase(), PipelinePhase::Idle);
        assert!(!run_state.should_continue());

        run_state.mark_running();
        assert_eq!(run_state.phase(), PipelinePhase::Running);
        assert!(run_state.should_continue());

        run_state.request_stop();
        assert_eq!(run_state.phase(), PipelinePhase::Stopping);
        assert!(!run_state.should_continue());

        run_state.mark_idle();
        assert_eq!(run_state.phase(), PipelinePhase::Idle);
        assert!(run_state.stop_requested());
    }
}
