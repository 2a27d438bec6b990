//! Integration tests for the double-buffered stream engine.
//!
//! A capture transport stands in for the native driver; slot completions
//! are injected by hand to exercise the backpressure contract.

use midideck_midi::stream::StreamRecord;
use midideck_out::{CaptureTransport, MidiOutput, OutputState, StreamNotice};

fn open_stream() -> MidiOutput<CaptureTransport> {
    let mut out = MidiOutput::new(CaptureTransport::new());
    out.stream_open().unwrap();
    out
}

// ---------------------------------------------------------------------------
// 1. Lifecycle: open -> start -> fill/flush -> pause -> resume -> stop
// ---------------------------------------------------------------------------

#[test]
fn test_full_stream_lifecycle() {
    let mut out = open_stream();
    assert_eq!(out.state(), OutputState::StreamIdle);

    // First start primes the pump: tempo, time division, both slots.
    out.stream_start(140.0, 192).unwrap();
    assert_eq!(out.state(), OutputState::StreamPlaying);
    assert_eq!(out.transport().tempo, Some(428_571));
    assert_eq!(out.transport().time_division, Some(192));
    assert_eq!(out.transport().submissions.len(), 2);

    // Hardware drains the primed slots; the engine reports readiness.
    out.transport().complete_slot(0);
    out.transport().complete_slot(1);
    let notices = out.poll_notices();
    assert_eq!(notices, vec![StreamNotice::Ready, StreamNotice::Ready]);

    // Fill one beat and flush it into slot 0.
    out.stream_send(0, 0x90, 60, 100);
    out.stream_send(48, 0x80, 60, 0);
    out.stream_delay(48);
    assert!(out.stream_flush());

    // Next segment goes to slot 1.
    out.stream_send(0, 0x90, 64, 100);
    out.stream_delay(96);
    assert!(out.stream_flush());

    let subs = &out.transport().submissions;
    assert_eq!(subs.len(), 4);
    assert_eq!(subs[2].0, 0);
    assert_eq!(subs[3].0, 1);

    // Pause preserves the mode; resume does not re-prime.
    out.stream_pause().unwrap();
    out.transport_mut().set_elapsed(96);
    out.stream_start(140.0, 192).unwrap();
    assert_eq!(out.transport().submissions.len(), 4);

    out.stream_stop().unwrap();
    assert_eq!(out.state(), OutputState::StreamIdle);

    out.close().unwrap();
    assert_eq!(out.state(), OutputState::Closed);
}

// ---------------------------------------------------------------------------
// 2. Backpressure
// ---------------------------------------------------------------------------

/// With both slots in flight, flushes fail and preserve the segment until a
/// completion notice arrives.
#[test]
fn test_flush_retries_until_slot_completes() {
    let mut out = open_stream();
    out.stream_start(120.0, 96).unwrap();

    out.stream_send(0, 0x90, 60, 100);
    let segment = out.buffered().to_vec();

    assert!(!out.stream_flush());
    assert!(!out.stream_flush());
    assert_eq!(out.buffered(), segment.as_slice());

    out.transport().complete_slot(0);
    assert!(out.stream_flush());
    assert!(out.buffered().is_empty());
}

/// Completing only the wrong slot does not unblock the ring: the flush
/// target is strictly alternating.
#[test]
fn test_ring_waits_for_current_slot() {
    let mut out = open_stream();
    out.stream_start(120.0, 96).unwrap();

    // Ring points at slot 0; only slot 1 completes.
    out.transport().complete_slot(1);
    out.stream_send(0, 0x90, 60, 100);
    assert!(!out.stream_flush());

    out.transport().complete_slot(0);
    assert!(out.stream_flush());
}

// ---------------------------------------------------------------------------
// 3. Payload integrity through the slot ring
// ---------------------------------------------------------------------------

/// Records written by the application come back out of the submitted slot
/// exactly, including long payloads with their padding stripped.
#[test]
fn test_submitted_segment_decodes_exactly() {
    let mut out = open_stream();
    out.stream_start(120.0, 96).unwrap();
    out.transport().complete_slot(0);

    let sysex = vec![0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7];
    out.stream_set_tempo(0, 90.0);
    out.stream_send(0, 0x91, 48, 88);
    out.stream_send_long(24, &sysex);
    out.stream_set_marker(72, 1234);
    assert!(out.stream_flush());

    let decoded = out.transport().decoded_submissions();
    let segment = decoded.last().unwrap();
    assert_eq!(
        segment.as_slice(),
        &[
            StreamRecord::Tempo {
                delta_ticks: 0,
                microseconds_per_quarter: 666_666,
            },
            StreamRecord::Short {
                delta_ticks: 0,
                status: 0x91,
                data1: 48,
                data2: 88,
            },
            StreamRecord::Long {
                delta_ticks: 24,
                payload: sysex.clone(),
            },
            StreamRecord::Nop {
                delta_ticks: 72,
                callback: true,
                value: 1234,
            },
        ]
    );
}

// ---------------------------------------------------------------------------
// 4. Markers and notices
// ---------------------------------------------------------------------------

#[test]
fn test_marker_playback_surfaces_value() {
    let mut out = open_stream();
    out.stream_start(120.0, 96).unwrap();

    out.transport().emit_marker(7);
    out.transport().complete_slot(0);
    out.transport().emit_marker(8);

    assert_eq!(
        out.poll_notices(),
        vec![
            StreamNotice::Marker(7),
            StreamNotice::Ready,
            StreamNotice::Marker(8),
        ]
    );
}

// ---------------------------------------------------------------------------
// 5. Mode switching
// ---------------------------------------------------------------------------

/// Re-opening in a different mode tears the previous mode down first.
#[test]
fn test_mode_switch_round_trip() {
    let mut out = MidiOutput::new(CaptureTransport::new());

    out.open().unwrap();
    out.send(0x90, 60, 100).unwrap();

    out.stream_open().unwrap();
    assert!(out.is_stream_open());
    assert!(!out.transport().is_open());

    out.open().unwrap();
    assert_eq!(out.state(), OutputState::Open);
    assert!(!out.transport().is_stream_open());
}

/// Direct sends still work while the device is in stream mode (the driver
/// accepts short messages on a stream handle).
#[test]
fn test_direct_send_in_stream_mode() {
    let mut out = open_stream();
    out.send(0xB0, 7, 127).unwrap();
    assert_eq!(out.transport().shorts.last(), Some(&[0xB0, 7, 127]));
}
