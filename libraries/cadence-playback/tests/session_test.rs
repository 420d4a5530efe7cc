//! Integration tests for the playback session
//!
//! Drives a full `Session` through the fake backend: transport, load
//! fencing, repeat modes, failure handling, drift correction and teardown.

mod common;

use cadence_playback::{
    FailureKind, LoadId, LoadOutcome, MediaError, MediaErrorKind, MediaEvent, PlaybackState,
    PlayerEvent, RepeatMode,
};
use common::*;
use std::time::Duration;

fn end_current(session: &mut cadence_playback::Session, backend: &FakeBackend) {
    session.handle_backend_event(backend.event(MediaEvent::Ended));
}

// ===== Transport =====

#[test]
fn test_load_track_starts_playback() {
    let (mut session, backend) = session();

    let outcome = session.load_track(track(1));

    assert!(matches!(outcome, LoadOutcome::Started(_)));
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(current_id(&session), Some(1));
    assert_eq!(backend.load_count(), 1);
    assert_eq!(backend.state().play_calls, 1);
    assert_eq!(
        backend.state().loads[0].url,
        "https://cdn.test/preview/1.mp3"
    );

    let events = session.drain_events();
    assert!(events.contains(&PlayerEvent::TrackChanged {
        track_id: track(1).id,
        previous: None,
    }));
}

#[test]
fn test_play_with_nothing_loaded_starts_queue_head() {
    let (mut session, backend) = session();
    session.add_to_queue(tracks([1, 2]), true);

    session.play().unwrap();

    assert_eq!(current_id(&session), Some(1));
    assert_eq!(queue_ids(&session), vec![2]);
    assert_eq!(backend.load_count(), 1);
}

#[test]
fn test_play_with_empty_session_fails() {
    let (mut session, _backend) = session();
    assert!(session.play().is_err());
}

#[test]
fn test_pause_and_toggle() {
    let (mut session, backend) = session();
    session.load_track(track(1));

    session.pause();
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(backend.state().pause_calls, 1);

    session.toggle_play().unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
}

#[test]
fn test_blocked_autoplay_leaves_transport_usable() {
    let (mut session, backend) = session();
    backend.state().fail_play = Some(MediaError::new(MediaErrorKind::Other, "NotAllowedError"));

    let outcome = session.load_track(track(1));

    assert!(matches!(outcome, LoadOutcome::Started(_)));
    assert_eq!(session.state(), PlaybackState::Paused);
    let snapshot = session.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.state, PlaybackState::Paused);
    assert!(!session
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::PlaybackFailed { .. })));

    session.play().unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(backend.state().play_calls, 2);
}

#[test]
fn test_seek_and_skip_clamp_to_duration() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.handle_backend_event(backend.event(MediaEvent::MetadataLoaded { duration: 30.0 }));

    session.seek(10.0).unwrap();
    session.skip_forward(15.0).unwrap();
    assert_eq!(session.snapshot().current_time, 25.0);

    session.skip_forward(15.0).unwrap();
    assert_eq!(session.snapshot().current_time, 30.0);

    session.skip_backward(100.0).unwrap();
    assert_eq!(session.snapshot().current_time, 0.0);
    assert_eq!(backend.state().position, 0.0);
}

#[test]
fn test_seek_without_track_fails() {
    let (mut session, _backend) = session();
    assert!(session.seek(5.0).is_err());
}

#[test]
fn test_play_next_moves_current_to_history() {
    let (mut session, _backend) = session();
    session.load_track(track(1));
    session.add_to_queue(tracks([2, 3]), true);

    session.play_next();

    assert_eq!(current_id(&session), Some(2));
    assert_eq!(queue_ids(&session), vec![3]);
    assert_eq!(history_ids(&session), vec![1]);
}

#[test]
fn test_previous_restarts_after_three_seconds() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.load_track(track(2));
    session.handle_backend_event(backend.event(MediaEvent::TimeUpdate { position: 10.0 }));

    assert!(session.play_previous().unwrap().is_none());
    assert_eq!(current_id(&session), Some(2));
    assert_eq!(session.snapshot().current_time, 0.0);

    assert!(session.play_previous().unwrap().is_some());
    assert_eq!(current_id(&session), Some(1));
    assert_eq!(queue_ids(&session), vec![2]);
    assert!(history_ids(&session).is_empty());
}

#[test]
fn test_queue_jump_moves_skipped_tracks_to_history() {
    let (mut session, _backend) = session();
    session.load_track(track(100));
    session.add_to_queue(tracks([1, 2, 3, 4]), true);

    session.play_from_queue(2).unwrap();

    assert_eq!(current_id(&session), Some(3));
    assert_eq!(queue_ids(&session), vec![4]);
    assert_eq!(history_ids(&session), vec![100, 1, 2]);
}

#[test]
fn test_queue_jump_out_of_bounds() {
    let (mut session, _backend) = session();
    session.add_to_queue(tracks([1]), true);
    assert!(session.play_from_queue(5).is_err());
    assert_eq!(queue_ids(&session), vec![1]);
}

// ===== Queue editing =====

#[test]
fn test_duplicates_are_rejected_with_event() {
    let (mut session, _backend) = session();
    session.load_track(track(1));
    session.add_to_queue(tracks([2]), true);
    session.drain_events();

    let outcome = session.add_to_queue(tracks([1, 2, 3]), true);

    assert_eq!(outcome.added, 1);
    assert_eq!(queue_ids(&session), vec![2, 3]);
    let rejected: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::DuplicateRejected { track_id, .. } => Some(track_id.get()),
            _ => None,
        })
        .collect();
    assert_eq!(rejected, vec![1, 2]);
}

#[test]
fn test_queue_editing_operations() {
    let (mut session, _backend) = session();
    session.load_track(track(1));
    session.add_to_queue(tracks([2, 3, 4]), true);

    session.add_to_play_next(tracks([9]));
    assert_eq!(queue_ids(&session), vec![9, 2, 3, 4]);

    session.reorder_queue(0, 3).unwrap();
    assert_eq!(queue_ids(&session), vec![2, 3, 4, 9]);

    session.remove_from_queue(1).unwrap();
    assert_eq!(queue_ids(&session), vec![2, 4, 9]);
    assert!(session.remove_from_queue(7).is_err());

    session.clear_queue();
    assert!(queue_ids(&session).is_empty());
    assert_eq!(current_id(&session), Some(1));
}

#[test]
fn test_shuffle_round_trip_restores_order() {
    let (mut session, _backend) = session();
    session.load_track(track(1));
    session.add_to_queue(tracks(2..12), true);

    assert!(session.toggle_shuffle());
    let mut shuffled = queue_ids(&session);
    shuffled.sort_unstable();
    assert_eq!(shuffled, (2..12).collect::<Vec<_>>());

    assert!(!session.toggle_shuffle());
    assert_eq!(queue_ids(&session), (2..12).collect::<Vec<_>>());
}

#[test]
fn test_cycle_repeat_mode() {
    let (mut session, _backend) = session();
    assert_eq!(session.repeat_mode(), RepeatMode::Off);
    assert_eq!(session.cycle_repeat_mode(), RepeatMode::All);
    assert_eq!(session.cycle_repeat_mode(), RepeatMode::One);
    assert_eq!(session.cycle_repeat_mode(), RepeatMode::Off);
}

// ===== Load fencing =====

#[test]
fn test_stale_events_do_not_touch_newer_load() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    let stale = backend.last_load_id();
    session.load_track(track(2));
    session.drain_events();

    session.handle_backend_event(cadence_playback::BackendEvent::new(
        stale,
        MediaEvent::Error(MediaError::new(MediaErrorKind::Network, "reset")),
    ));
    session.handle_backend_event(cadence_playback::BackendEvent::new(
        stale,
        MediaEvent::MetadataLoaded { duration: 999.0 },
    ));
    session.handle_backend_event(cadence_playback::BackendEvent::new(
        stale,
        MediaEvent::Ended,
    ));

    assert_eq!(current_id(&session), Some(2));
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.snapshot().duration, 200.0);
    assert!(session.drain_events().is_empty());
    assert_eq!(backend.load_count(), 2);
}

#[test]
fn test_events_for_unknown_load_are_dropped() {
    let (mut session, _backend) = session();
    session.load_track(track(1));
    session.drain_events();

    session.handle_backend_event(cadence_playback::BackendEvent::new(
        LoadId(999),
        MediaEvent::Ended,
    ));

    assert_eq!(current_id(&session), Some(1));
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_abort_during_rapid_switching_is_not_a_failure() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.load_track(track(2));
    session.drain_events();

    session.handle_backend_event(backend.event(MediaEvent::Error(MediaError::aborted())));

    assert_eq!(session.state(), PlaybackState::Playing);
    assert!(!session
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::PlaybackFailed { .. })));
}

#[test]
fn test_aborted_live_load_settles_in_paused() {
    let (mut session, backend) = session();
    backend.state().fail_loads = vec![MediaError::aborted()];

    session.load_track(track(1));

    assert_eq!(session.state(), PlaybackState::Paused);
    assert!(!session
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::PlaybackFailed { .. })));

    session.advance(Duration::from_secs(10));
    assert_eq!(backend.load_count(), 1);
    session.play().unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
}

// ===== Repeat modes =====

#[test]
fn test_repeat_one_replays_without_advancing() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.add_to_queue(tracks([2]), true);
    session.set_repeat_mode(RepeatMode::One);

    for _ in 0..5 {
        end_current(&mut session, &backend);
    }

    assert_eq!(current_id(&session), Some(1));
    assert_eq!(queue_ids(&session), vec![2]);
    assert!(history_ids(&session).is_empty());
    assert_eq!(backend.load_count(), 1);
    assert_eq!(backend.state().play_calls, 6);
    assert_eq!(session.state(), PlaybackState::Playing);
}

#[test]
fn test_track_end_advances_queue() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.add_to_queue(tracks([2]), true);

    end_current(&mut session, &backend);

    assert_eq!(current_id(&session), Some(2));
    assert_eq!(backend.load_count(), 2);
}

#[test]
fn test_end_of_queue_without_repeat_goes_idle() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.drain_events();

    end_current(&mut session, &backend);

    assert_eq!(session.state(), PlaybackState::Idle);
    assert!(session.drain_events().contains(&PlayerEvent::PlaybackEnded));

    session.play().unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(backend.state().position, 0.0);
}

#[test]
fn test_repeat_all_rebuilds_queue_from_history() {
    let (mut session, backend) = session();
    for id in [1, 2, 3, 4] {
        session.load_track(track(id));
    }
    assert_eq!(history_ids(&session), vec![1, 2, 3]);
    session.set_repeat_mode(RepeatMode::All);
    session.drain_events();

    end_current(&mut session, &backend);

    assert_eq!(queue_ids(&session), vec![1, 2, 3]);
    assert!(history_ids(&session).is_empty());
    assert_eq!(session.state(), PlaybackState::Idle);
    assert!(session
        .drain_events()
        .contains(&PlayerEvent::QueueWrapped { length: 3 }));

    session.play().unwrap();
    assert_eq!(current_id(&session), Some(1));
    assert_eq!(queue_ids(&session), vec![2, 3]);
}

// ===== Failures =====

fn network_error() -> MediaError {
    MediaError::new(MediaErrorKind::Network, "connection reset")
}

#[test]
fn test_transient_load_failure_retries_then_recovers() {
    let (mut session, backend) = session();
    backend.state().fail_loads = vec![network_error()];

    session.load_track(track(1));
    assert_eq!(session.state(), PlaybackState::Loading);
    assert_eq!(backend.load_count(), 1);

    session.advance(Duration::from_millis(1000));

    assert_eq!(backend.load_count(), 2);
    assert_eq!(session.state(), PlaybackState::Playing);
}

#[test]
fn test_failed_track_is_suppressed_for_the_session() {
    let (mut session, backend) = session();
    backend.state().fail_loads = vec![network_error(); 4];

    session.load_track(track(1));
    for delay in [1000, 2000, 4000] {
        session.advance(Duration::from_millis(delay));
    }

    assert_eq!(backend.load_count(), 4);
    assert_eq!(session.state(), PlaybackState::Error);
    let failures: Vec<_> = session
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, PlayerEvent::PlaybackFailed { .. }))
        .collect();
    assert_eq!(failures.len(), 1);

    let timers_before = session.pending_timer_count();
    let outcome = session.load_track(track(1));

    assert_eq!(outcome, LoadOutcome::Suppressed);
    assert_eq!(backend.load_count(), 4);
    assert_eq!(session.pending_timer_count(), timers_before);
    assert!(session.drain_events().is_empty());
}

#[test]
fn test_repeated_mid_track_drops_exhaust_the_retry_budget() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    session.handle_backend_event(backend.event(MediaEvent::CanPlay));
    session.drain_events();

    for delay in [1000, 2000, 4000] {
        session.handle_backend_event(backend.event(MediaEvent::Error(network_error())));
        assert_eq!(session.state(), PlaybackState::Loading);
        session.advance(Duration::from_millis(delay));
        session.handle_backend_event(backend.event(MediaEvent::CanPlay));
        assert_eq!(session.state(), PlaybackState::Playing);
    }
    session.handle_backend_event(backend.event(MediaEvent::Error(network_error())));

    assert_eq!(backend.load_count(), 4);
    assert_eq!(session.state(), PlaybackState::Error);
    assert!(session.drain_events().iter().any(|e| matches!(
        e,
        PlayerEvent::PlaybackFailed {
            kind: FailureKind::Generic,
            ..
        }
    )));
    assert_eq!(session.load_track(track(1)), LoadOutcome::Suppressed);
}

#[test]
fn test_service_unavailable_fails_without_retry() {
    let (mut session, backend) = session();
    backend.state().fail_loads = vec![MediaError::new(
        MediaErrorKind::ServiceUnavailable,
        "catalog down",
    )];

    session.load_track(track(1));

    assert_eq!(backend.load_count(), 1);
    assert_eq!(session.state(), PlaybackState::Error);
    assert!(session.drain_events().iter().any(|e| matches!(
        e,
        PlayerEvent::PlaybackFailed {
            kind: FailureKind::ServiceUnavailable,
            ..
        }
    )));
}

#[test]
fn test_track_without_preview_fails_terminally() {
    let (mut session, backend) = session();
    let mut silent = track(1);
    silent.preview_url = None;

    assert_eq!(session.load_track(silent), LoadOutcome::Failed);
    assert_eq!(backend.load_count(), 0);
    assert_eq!(session.state(), PlaybackState::Error);
}

#[test]
fn test_play_next_skips_failed_queue_heads() {
    let (mut session, backend) = session();
    backend.state().fail_loads = vec![MediaError::new(
        MediaErrorKind::ServiceUnavailable,
        "catalog down",
    )];
    session.load_track(track(1));
    session.load_track(track(2));
    session.add_to_queue(tracks([1, 3]), false);

    session.play_next();

    assert_eq!(current_id(&session), Some(3));
    assert!(queue_ids(&session).is_empty());
}

// ===== Volume and rate =====

#[test]
fn test_volume_clamps_and_reaches_backend() {
    let (mut session, backend) = session();

    assert_eq!(session.set_volume(1.7), 1.0);
    assert_eq!(session.set_volume(0.3), 0.3);
    assert_eq!(backend.state().volume, 0.3);

    assert!(session.toggle_mute());
    assert!(backend.state().muted);
    assert!(session.snapshot().is_muted);
}

#[test]
fn test_playback_rate_range() {
    let (mut session, backend) = session();

    session.set_playback_rate(1.5).unwrap();
    assert_eq!(backend.state().rate, 1.5);
    assert!(session.set_playback_rate(10.0).is_err());
    assert_eq!(session.playback_rate(), 1.5);
}

// ===== Resilience =====

#[test]
fn test_drift_is_corrected_on_interval() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    {
        let mut state = backend.state();
        state.rate = 1.5;
        state.preserves_pitch = false;
    }
    session.drain_events();

    session.advance(Duration::from_millis(1000));

    assert_eq!(backend.state().rate, 1.0);
    assert_eq!(backend.state().default_rate, 1.0);
    assert!(backend.state().preserves_pitch);
    assert!(session.drain_events().contains(&PlayerEvent::DriftCorrected {
        rate: 1.5,
        default_rate: 1.0,
        preserves_pitch: false,
    }));
}

#[test]
fn test_rate_change_event_triggers_immediate_correction() {
    let (mut session, backend) = session();
    session.load_track(track(1));
    backend.state().default_rate = 2.0;

    session.handle_backend_event(backend.event(MediaEvent::RateChange));

    assert_eq!(backend.state().default_rate, 1.0);
}

#[test]
fn test_visibility_restores_volume() {
    let (mut session, backend) = session();
    session.set_volume(0.4);
    backend.state().volume = 0.0;

    session.on_visibility_change(false);
    assert_eq!(backend.state().volume, 0.0);

    session.on_visibility_change(true);
    assert_eq!(backend.state().volume, 0.4);

    backend.state().muted = true;
    session.on_resume();
    assert!(!backend.state().muted);
}

// ===== Timers and teardown =====

#[test]
fn test_timer_count_is_bounded_across_cycles() {
    let (mut session, _backend) = session();
    session.load_track(track(1));
    session.pause();
    session.play().unwrap();
    let baseline = session.pending_timer_count();

    for _ in 0..50 {
        session.pause();
        session.play().unwrap();
        session.advance(Duration::from_millis(100));
        assert!(session.pending_timer_count() <= baseline);
    }
}

#[test]
fn test_teardown_cancels_every_timer() {
    let (mut session, backend) = session();
    backend.state().fail_loads = vec![network_error()];
    session.load_track(track(1));
    assert!(session.pending_timer_count() >= 2);

    session.teardown();

    assert_eq!(session.pending_timer_count(), 0);
    session.advance(Duration::from_secs(60));
    assert_eq!(backend.load_count(), 1);

    session.teardown();
    assert_eq!(session.pending_timer_count(), 0);
}

#[test]
fn test_output_handle_is_stable() {
    let (mut session, _backend) = session();
    let handle = session.output_handle();
    session.load_track(track(1));
    session.load_track(track(2));
    assert_eq!(session.output_handle(), handle);
}
