use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use live_eq_lib::audio::errors::ControlError;
use live_eq_lib::audio::mixer::{ControlState, PipelinePhase, RunState};

/// Live control state: gains, master volume and run flags
#[cfg(test)]
mod control_state_tests {
    use super::*;

    #[test]
    fn test_initial_state_is_flat() {
        let control = ControlState::new(18, 0.8);
        let snapshot = control.snapshot();
        assert_eq!(snapshot.gains, vec![0.0; 18]);
        assert_eq!(snapshot.master_volume, 0.8);
        assert_eq!(control.band_count(), 18);
    }

    #[test]
    fn test_band_gain_is_clamped_and_reported() {
        let control = ControlState::new(4, 1.0);
        assert_eq!(control.set_band_gain(2, 6.5).unwrap(), 6.5);
        assert_eq!(control.set_band_gain(3, 45.0).unwrap(), 20.0);
        assert_eq!(control.set_band_gain(0, -99.0).unwrap(), -20.0);
        assert_eq!(control.gains(), vec![-20.0, 0.0, 6.5, 20.0]);
        assert_eq!(control.band_gain(2), Some(6.5));
        assert_eq!(control.band_gain(4), None);
    }

    #[test]
    fn test_bad_band_updates_are_rejected() {
        let control = ControlState::new(4, 1.0);
        assert_eq!(
            control.set_band_gain(4, 1.0),
            Err(ControlError::BandIndexOutOfRange { index: 4, bands: 4 })
        );
        assert!(matches!(
            control.set_band_gain(0, f32::NAN),
            Err(ControlError::NonFinite { .. })
        ));
        assert_eq!(
            control.set_gains(&[1.0, 2.0]),
            Err(ControlError::GainCountMismatch { gains: 2, bands: 4 })
        );
        assert_eq!(control.gains(), vec![0.0; 4]);
    }

    #[test]
    fn test_master_volume_range() {
        let control = ControlState::new(1, 1.0);
        assert_eq!(control.set_master_volume(1.5).unwrap(), 1.5);
        assert_eq!(control.set_master_volume(3.0).unwrap(), 2.0);
        assert_eq!(control.set_master_volume(-0.5).unwrap(), 0.0);
        assert!(control.set_master_volume(f32::INFINITY).is_err());
        assert_eq!(control.master_volume(), 0.0);
    }

    #[test]
    fn test_reset_flattens_every_band_in_one_update() {
        let control = ControlState::new(3, 1.0);
        control.set_gains(&[3.0, -3.0, 9.0]).unwrap();
        let before = control.version();

        control.reset_gains();
        assert_eq!(control.gains(), vec![0.0; 3]);
        assert_eq!(control.version(), before + 1);
    }

    #[test]
    fn test_snapshots_never_observe_a_partial_bulk_update() {
        let control = Arc::new(ControlState::new(18, 1.0));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let control = control.clone();
            let done = done.clone();
            thread::spawn(move || {
                let boost = vec![6.0; 18];
                let cut = vec![-6.0; 18];
                for i in 0..5000 {
                    let gains = if i % 2 == 0 { &boost } else { &cut };
                    control.set_gains(gains).unwrap();
                }
                done.store(true, Ordering::Release);
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let control = control.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut checked = 0u64;
                    while !done.load(Ordering::Acquire) {
                        let snapshot = control.snapshot();
                        let first = snapshot.gains[0];
                        assert!(
                            snapshot.gains.iter().all(|gain| *gain == first),
                            "torn snapshot: {:?}",
                            snapshot.gains
                        );
                        checked += 1;
                    }
                    checked
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(control.version(), 5000);
    }

    #[test]
    fn test_run_state_transitions() {
        let run_state = RunState::new();
        assert_eq!(run_state.phase(), PipelinePhase::Idle);

        // Stop before start leaves the phase idle
        run_state.request_stop();
        assert_eq!(run_state.phase(), PipelinePhase::Idle);

        run_state.mark_running();
        assert!(run_state.should_continue());
        assert!(!run_state.stop_requested());

        run_state.request_stop();
        assert_eq!(run_state.phase(), PipelinePhase::Stopping);
        assert!(run_state.is_running());
        assert!(!run_state.should_continue());

        run_state.mark_idle();
        assert_eq!(run_state.phase(), PipelinePhase::Idle);
        assert!(!run_state.is_running());
    }
}
