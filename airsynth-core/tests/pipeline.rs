mod common;

use airsynth_core::router::ParticleSpawn;
use airsynth_core::synth::graph::lock;
use airsynth_core::{
    Engine, EngineConfig, EngineEvent, FingerKey, FingerName, HandSide, PresetLibrary,
    TrackedHand,
};
use common::{fist, only_thumb, tracked};

const FRAME_MS: f64 = 1000.0 / 30.0;
const LEFT_THUMB: FingerKey = FingerKey::new(HandSide::Left, FingerName::Thumb);

fn engine() -> Engine {
    let mut engine = Engine::with_builtin_presets(EngineConfig::default()).unwrap();
    engine.initialize_audio(48_000);
    engine
}

fn run(engine: &mut Engine, frames: &[Vec<TrackedHand>]) -> Vec<EngineEvent> {
    frames
        .iter()
        .enumerate()
        .flat_map(|(i, hands)| engine.process_frame(hands, i as f64 * FRAME_MS).events)
        .collect()
}

#[test]
fn left_thumb_plays_c_major_then_releases() {
    let mut engine = engine();
    let mut frames = vec![vec![only_thumb(HandSide::Left)]; 5];
    frames.push(vec![fist(HandSide::Left)]);

    let events = run(&mut engine, &frames);
    assert_eq!(events.len(), 4, "{:#?}", events);
    assert_eq!(
        events[0],
        EngineEvent::NoteOn {
            key: LEFT_THUMB,
            notes: vec![60, 64, 67]
        }
    );
    match &events[1] {
        EngineEvent::Particle(ParticleSpawn {
            color,
            display_name,
            position,
        }) => {
            assert_eq!(color, "#FF6B6B");
            assert_eq!(display_name, "C");
            // Thumb tip at x = 0.28, mirrored.
            assert!((position.x - 0.72).abs() < 1e-4);
        }
        other => panic!("expected particle, got {:?}", other),
    }
    assert!(matches!(&events[2], EngineEvent::History(h) if h.display_name == "C"));
    assert_eq!(events[3], EngineEvent::NoteOff { key: LEFT_THUMB });
    assert!(engine.sounding_keys().is_empty());
}

#[test]
fn flicker_delays_the_note() {
    let mut engine = engine();
    let pattern = [true, true, false, true, true, true];
    let mut note_on_frames = Vec::new();
    for (i, up) in pattern.iter().enumerate() {
        let hand = if *up {
            only_thumb(HandSide::Left)
        } else {
            fist(HandSide::Left)
        };
        let report = engine.process_frame(&[hand], i as f64 * FRAME_MS);
        if report
            .events
            .iter()
            .any(|e| matches!(e, EngineEvent::NoteOn { .. }))
        {
            note_on_frames.push(i + 1);
        }
    }
    assert_eq!(note_on_frames, vec![6]);
}

#[test]
fn both_hands_play_independently() {
    let mut engine = engine();
    let frame = vec![
        only_thumb(HandSide::Left),
        tracked(HandSide::Right, [false, true, false, false, false]),
    ];
    run(&mut engine, &vec![frame; 3]);

    let right_index = FingerKey::new(HandSide::Right, FingerName::Index);
    assert_eq!(engine.active_keys(), vec![LEFT_THUMB, right_index]);
    assert_eq!(engine.sounding_keys(), vec![LEFT_THUMB, right_index]);
    let chord = &engine.synth().voice(right_index).unwrap().notes;
    assert_eq!(chord, &vec![60, 64, 67, 70]);
}

#[test]
fn losing_the_hand_releases_its_notes() {
    let mut engine = engine();
    let mut frames = vec![vec![tracked(HandSide::Left, [true; 5])]; 3];
    frames.push(vec![]);
    let events = run(&mut engine, &frames);

    let offs = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::NoteOff { .. }))
        .count();
    assert_eq!(offs, 5);
    assert!(engine.active_keys().is_empty());
    assert!(engine.sounding_keys().is_empty());
}

#[test]
fn holding_a_finger_never_retriggers() {
    let mut engine = engine();
    let frames = vec![vec![only_thumb(HandSide::Left)]; 60];
    let events = run(&mut engine, &frames);
    let ons = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::NoteOn { .. }))
        .count();
    assert_eq!(ons, 1);
    assert_eq!(engine.history().len(), 1);
}

#[test]
fn released_voices_leave_the_graph() {
    let mut engine = engine();
    let mut frames = vec![vec![only_thumb(HandSide::Left)]; 3];
    frames.push(vec![fist(HandSide::Left)]);
    run(&mut engine, &frames);

    let graph = engine.synth().graph().unwrap();
    assert_eq!(lock(&graph).node_count(), 3);
    let mut buf = vec![0.0; 48_000];
    lock(&graph).render(&mut buf);
    assert_eq!(lock(&graph).node_count(), 0);
}

#[test]
fn tracking_quality_rises_for_a_steady_hand() {
    let mut engine = engine();
    run(&mut engine, &vec![vec![fist(HandSide::Right)]; 45]);
    assert!(engine.accuracy(HandSide::Right) > 0.9);
    assert_eq!(engine.accuracy(HandSide::Left), 0.0);
}

#[test]
fn frames_parse_from_tracker_json() {
    let hand = only_thumb(HandSide::Right);
    let json = serde_json::to_string(&vec![hand]).unwrap();
    let hands: Vec<TrackedHand> = serde_json::from_str(&json).unwrap();

    let mut engine = engine();
    run(&mut engine, &vec![hands; 3]);
    assert_eq!(
        engine.active_keys(),
        vec![FingerKey::new(HandSide::Right, FingerName::Thumb)]
    );
}

#[test]
fn quick_regrab_on_a_large_preset_keeps_every_finger_sounding() {
    let mut engine = Engine::new(
        EngineConfig::default(),
        Box::new(PresetLibrary::builtin()),
        "string-ensemble-1",
    )
    .unwrap();
    let graph = engine.initialize_audio(48_000);

    let open = vec![
        tracked(HandSide::Left, [true; 5]),
        tracked(HandSide::Right, [true; 5]),
    ];
    let closed = vec![fist(HandSide::Left), fist(HandSide::Right)];
    let mut frames = vec![open.clone(); 3];
    frames.push(closed);
    frames.extend(vec![open; 3]);

    let mut block = vec![0.0; 1600];
    let mut failed = 0;
    for (i, hands) in frames.iter().enumerate() {
        let report = engine.process_frame(hands, i as f64 * FRAME_MS);
        failed += report.failed_notes.len();
        assert_eq!(report.active, engine.sounding_keys());
        lock(&graph).render(&mut block);
    }

    assert_eq!(failed, 0);
    assert_eq!(engine.sounding_keys().len(), 10);
}
