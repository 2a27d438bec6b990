//! Integration tests for the channel-ownership machinery.
//!
//! These drive full instrument workflows against the capture transport and
//! pin down the exact wire sequences of channel re-initialization.

use midideck_out::{
    CaptureTransport, ChannelRegistry, Instrument, InstrumentId, InstrumentMacro, MidiOutput, Rack,
};

fn open_direct() -> MidiOutput<CaptureTransport> {
    let mut out = MidiOutput::new(CaptureTransport::new());
    out.open().unwrap();
    out
}

// ---------------------------------------------------------------------------
// 1. The full re-init sequence, byte for byte
// ---------------------------------------------------------------------------

/// A brand-new instrument's very first note triggers the complete init
/// sequence, in order, entirely on its own channel.
#[test]
fn test_first_note_emits_full_init_sequence() {
    let mut out = open_direct();
    let mut registry = ChannelRegistry::new();
    let mut inst = Instrument::new(InstrumentId::from_raw(0), 9);

    inst.note_on(None, &mut out, &mut registry, 36, 127).unwrap();

    let shorts = &out.transport().shorts;
    let expected: Vec<[u8; 3]> = vec![
        // (1) controller reset
        [0xB9, 121, 0],
        // (2) bank and program
        [0xB9, 0, 0],
        [0xB9, 32, 0],
        [0xC9, 0, 0],
        // (3) RPN pitch bend range: 2.0 semitones -> 256
        [0xB9, 101, 0],
        [0xB9, 100, 0],
        [0xB9, 6, 2],
        [0xB9, 38, 0],
        [0xB9, 101, 0x7F],
        // (4) pitch wheel re-centered
        [0xE9, 0x00, 0x40],
        // (5) master tune and finetune, transpose 0 -> 64 / 64
        [0xB9, 101, 0],
        [0xB9, 100, 2],
        [0xB9, 6, 64],
        [0xB9, 38, 0],
        [0xB9, 101, 0x7F],
        [0xB9, 101, 0],
        [0xB9, 100, 1],
        [0xB9, 6, 64],
        [0xB9, 38, 0],
        [0xB9, 101, 0x7F],
        // (6) no macros; the triggering note follows
        [0x99, 36, 127],
    ];
    assert_eq!(shorts.as_slice(), expected.as_slice());
    assert!(registry.is_owner(9, inst.id()));
}

/// Macros are re-sent with their init values at the end of the sequence,
/// in declaration order.
#[test]
fn test_init_sends_macros_in_declaration_order() {
    let mut out = open_direct();
    let mut registry = ChannelRegistry::new();
    let mut inst = Instrument::new(InstrumentId::from_raw(0), 0);
    inst.add_macro(InstrumentMacro::control_change(74, 100));
    inst.add_macro(InstrumentMacro::control_change(71, 20));

    inst.init(None, &mut out, &mut registry).unwrap();

    let shorts = &out.transport().shorts;
    let tail = &shorts[shorts.len() - 2..];
    assert_eq!(tail, &[[0xB0, 74, 100], [0xB0, 71, 20]]);
}

// ---------------------------------------------------------------------------
// 2. Ownership and invalidation
// ---------------------------------------------------------------------------

/// Ownership holds across all 16 channels.
#[test]
fn test_ownership_claimed_on_every_channel() {
    let mut out = open_direct();
    let mut registry = ChannelRegistry::new();

    for channel in 0..16u8 {
        let mut inst = Instrument::new(InstrumentId::from_raw(channel as u64), channel);
        inst.note_on(None, &mut out, &mut registry, 60, 100).unwrap();
        assert_eq!(registry.owner(channel), Some(inst.id()));
    }
}

/// Two instruments sharing a channel re-init on every switch; ownership is
/// never cached across instruments.
#[test]
fn test_alternating_instruments_reinit_every_switch() {
    let mut out = open_direct();
    let mut registry = ChannelRegistry::new();
    let mut a = Instrument::new(InstrumentId::from_raw(1), 5);
    let mut b = Instrument::new(InstrumentId::from_raw(2), 5);

    let mut boundaries = Vec::new();
    for _ in 0..3 {
        a.note_on(None, &mut out, &mut registry, 60, 100).unwrap();
        assert_eq!(registry.owner(5), Some(a.id()));
        boundaries.push(out.transport().shorts.len());

        b.note_on(None, &mut out, &mut registry, 62, 100).unwrap();
        assert_eq!(registry.owner(5), Some(b.id()));
        boundaries.push(out.transport().shorts.len());
    }

    // Every switch emitted a controller reset before its note: each segment
    // between boundaries starts with all-controllers-off on channel 5.
    let shorts = &out.transport().shorts;
    let mut start = 0;
    for &end in &boundaries {
        assert_eq!(shorts[start], [0xB5, 121, 0]);
        assert!(end - start > 1);
        start = end;
    }
}

/// With no edits in between, the second call sends just the message.
#[test]
fn test_unchanged_instrument_skips_reinit() {
    let mut out = open_direct();
    let mut registry = ChannelRegistry::new();
    let mut inst = Instrument::new(InstrumentId::from_raw(1), 3);

    inst.note_on(None, &mut out, &mut registry, 60, 100).unwrap();
    let after_init = out.transport().shorts.len();

    inst.note_off(None, &mut out, &mut registry, 60, 100).unwrap();
    inst.pitch(None, &mut out, &mut registry, 0x2100).unwrap();
    assert_eq!(out.transport().shorts.len(), after_init + 2);
}

/// An edit between sends forces exactly one more re-init.
#[test]
fn test_edit_forces_single_reinit() {
    let mut out = open_direct();
    let mut registry = ChannelRegistry::new();
    let mut inst = Instrument::new(InstrumentId::from_raw(1), 0);

    inst.note_on(None, &mut out, &mut registry, 60, 100).unwrap();
    inst.set_program(5);

    let before = out.transport().shorts.len();
    inst.note_on(None, &mut out, &mut registry, 60, 100).unwrap();
    // 20 init messages + the note
    assert_eq!(out.transport().shorts.len(), before + 21);

    // Program change now carries the edited value.
    let shorts = &out.transport().shorts;
    assert_eq!(shorts[before + 3], [0xC0, 5, 0]);
}

// ---------------------------------------------------------------------------
// 3. Scheduled (stream) sends
// ---------------------------------------------------------------------------

/// A scheduled send that triggers a re-init puts the caller's delta on the
/// first init record; everything after plays at once.
#[test]
fn test_scheduled_reinit_consumes_callers_delta() {
    let mut out = MidiOutput::new(CaptureTransport::new());
    out.stream_open().unwrap();
    let mut registry = ChannelRegistry::new();
    let mut inst = Instrument::new(InstrumentId::from_raw(1), 2);

    inst.note_on(Some(96), &mut out, &mut registry, 60, 100).unwrap();

    let deltas: Vec<u32> = midideck_midi::records(out.buffered())
        .map(|r| match r {
            midideck_midi::StreamRecord::Short { delta_ticks, .. } => delta_ticks,
            other => panic!("unexpected record {:?}", other),
        })
        .collect();

    assert_eq!(deltas.len(), 21);
    assert_eq!(deltas[0], 96);
    assert!(deltas[1..].iter().all(|&d| d == 0));
}

/// A zero-delta scheduled send keeps delta zero throughout.
#[test]
fn test_scheduled_send_at_zero_delta() {
    let mut out = MidiOutput::new(CaptureTransport::new());
    out.stream_open().unwrap();
    let mut registry = ChannelRegistry::new();
    let mut inst = Instrument::new(InstrumentId::from_raw(1), 2);

    inst.note_on(Some(0), &mut out, &mut registry, 60, 100).unwrap();

    let count = midideck_midi::records(out.buffered()).count();
    assert_eq!(count, 21);
}

// ---------------------------------------------------------------------------
// 4. Rack-level workflows
// ---------------------------------------------------------------------------

/// Driving instruments through the rack's split borrow keeps ownership in
/// the rack's own registry.
#[test]
fn test_rack_entry_workflow() {
    let mut out = open_direct();
    let mut rack = Rack::new();
    let lead = rack.add_instrument(0).unwrap();
    let pad = rack.add_instrument(0).unwrap();

    {
        let (inst, registry) = rack.entry(lead).unwrap();
        inst.note_on(None, &mut out, registry, 60, 100).unwrap();
    }
    assert_eq!(rack.registry().owner(0), Some(lead));

    let (inst, registry) = rack.entry(pad).unwrap();
    inst.note_on(None, &mut out, registry, 64, 100).unwrap();
    assert_eq!(rack.registry().owner(0), Some(pad));
}
