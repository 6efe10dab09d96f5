// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end playback behavior through the reference scene graph.

use scene_sequencer::{
    AnimationManager, EasingMode, Keyframe, NodeId, PlaybackState, Property, PropertyTrack,
    PropertyValue, SceneGraph, SceneNode, Sequence, SequenceId,
};
use std::cell::RefCell;
use std::rc::Rc;

const SLIDE: SequenceId = SequenceId(1);
const FADE: SequenceId = SequenceId(2);

struct Fixture {
    scene: SceneGraph,
    manager: AnimationManager,
    sprite: NodeId,
}

fn track(property: Property, keys: Vec<Keyframe>) -> PropertyTrack {
    PropertyTrack::with_keyframes(property, keys).unwrap()
}

/// "slide": eased position, rotation and a visibility flip over 3s.
/// "fade": opacity 1 -> 0 over 1s.
fn fixture() -> Fixture {
    let mut scene = SceneGraph::new();
    let sprite = scene.insert(SceneNode::new("sprite").with_position([10.0, 10.0]));
    let mut manager = AnimationManager::default();

    let mut slide = Sequence::new(SLIDE, "slide", 3.0);
    slide.add_callback(0.0, "start");
    slide.add_callback(1.0, "one");
    slide.add_callback(2.0, "two");
    slide.add_callback(3.0, "end");
    manager.add_sequence(slide).unwrap();
    manager.add_sequence(Sequence::new(FADE, "fade", 1.0)).unwrap();

    manager
        .add_node(
            &scene,
            sprite,
            [
                (
                    SLIDE,
                    vec![
                        track(
                            Property::Position,
                            vec![
                                Keyframe::new(0.0, PropertyValue::Vector([0.0, 0.0]))
                                    .with_easing(EasingMode::ease_in_out()),
                                Keyframe::new(1.5, PropertyValue::Vector([100.0, 50.0]))
                                    .with_easing(EasingMode::BounceOut),
                                Keyframe::new(3.0, PropertyValue::Vector([200.0, 0.0])),
                            ],
                        ),
                        track(
                            Property::Rotation,
                            vec![
                                Keyframe::new(0.0, PropertyValue::Number(0.0)),
                                Keyframe::new(3.0, PropertyValue::Number(270.0)),
                            ],
                        ),
                        track(
                            Property::Visible,
                            vec![
                                Keyframe::new(0.0, PropertyValue::Bool(false)),
                                Keyframe::new(2.0, PropertyValue::Bool(true)),
                            ],
                        ),
                    ],
                ),
                (
                    FADE,
                    vec![track(
                        Property::Opacity,
                        vec![
                            Keyframe::new(0.0, PropertyValue::Number(1.0)),
                            Keyframe::new(1.0, PropertyValue::Number(0.0)),
                        ],
                    )],
                ),
            ],
        )
        .unwrap();

    Fixture { scene, manager, sprite }
}

fn fired_log(manager: &mut AnimationManager, ids: &[&str]) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for id in ids {
        let sink = log.clone();
        manager.register_keyframe_callback(*id, move |event, _| {
            sink.borrow_mut().push(event.callback_id.to_string());
        });
    }
    log
}

#[test]
fn test_seek_matches_play() {
    for target in [0.4_f32, 1.5, 2.2, 2.9] {
        let mut played = fixture();
        played.manager.run_sequence(&mut played.scene, "slide", 0.0).unwrap();
        let ticks = 8;
        for _ in 0..ticks {
            played.manager.update(&mut played.scene, target / ticks as f32);
        }
        // Play up to the same clock as the seek below
        let clock = played.manager.elapsed_time();

        let mut seeked = fixture();
        seeked.manager.time_seek(&mut seeked.scene, "slide", clock).unwrap();

        let a = played.scene.get(played.sprite).unwrap();
        let b = seeked.scene.get(seeked.sprite).unwrap();
        assert_eq!(a.position, b.position, "position at {clock}");
        assert_eq!(a.rotation, b.rotation, "rotation at {clock}");
        assert_eq!(a.visible, b.visible, "visible at {clock}");
    }
}

#[test]
fn test_keyframe_values_are_exact() {
    let mut f = fixture();
    f.manager.time_seek(&mut f.scene, "slide", 1.5).unwrap();
    assert_eq!(f.scene.get(f.sprite).unwrap().position, [100.0, 50.0]);
    f.manager.time_seek(&mut f.scene, "slide", 3.0).unwrap();
    let sprite = f.scene.get(f.sprite).unwrap();
    assert_eq!(sprite.position, [200.0, 0.0]);
    assert_eq!(sprite.rotation, 270.0);
}

#[test]
fn test_discrete_property_steps() {
    let mut f = fixture();
    f.manager.time_seek(&mut f.scene, "slide", 1.99).unwrap();
    assert!(!f.scene.get(f.sprite).unwrap().visible);
    f.manager.time_seek(&mut f.scene, "slide", 2.0).unwrap();
    assert!(f.scene.get(f.sprite).unwrap().visible);
}

#[test]
fn test_callbacks_fire_once_across_updates() {
    let mut f = fixture();
    let log = fired_log(&mut f.manager, &["start", "one", "two", "end"]);

    f.manager.run_sequence(&mut f.scene, "slide", 0.0).unwrap();
    for _ in 0..30 {
        f.manager.update(&mut f.scene, 0.1);
    }
    f.manager.update(&mut f.scene, 1.0);
    assert_eq!(*log.borrow(), vec!["start", "one", "two", "end"]);
}

#[test]
fn test_backward_playback_fires_in_reverse() {
    let mut f = fixture();
    f.manager.time_seek(&mut f.scene, "slide", 3.0).unwrap();
    let log = fired_log(&mut f.manager, &["start", "one", "two", "end"]);
    f.manager.set_playback_speed(-2.0);

    f.manager.update(&mut f.scene, 0.75);
    assert_eq!(*log.borrow(), vec!["two"]);
    f.manager.update(&mut f.scene, 1.0);
    assert_eq!(*log.borrow(), vec!["two", "one", "start"]);
    assert_eq!(f.manager.state(), PlaybackState::Idle);
}

#[test]
fn test_tween_endpoints() {
    let mut f = fixture();
    f.manager.set_base_value(PropertyValue::Number(90.0), f.sprite, Property::Rotation);

    f.manager.run_sequence(&mut f.scene, "slide", 0.5).unwrap();
    assert_eq!(f.scene.get(f.sprite).unwrap().rotation, 90.0);

    f.manager.update(&mut f.scene, 0.25);
    assert_eq!(f.scene.get(f.sprite).unwrap().rotation, 45.0);

    // Leftover time after the window moves the sequence clock
    f.manager.update(&mut f.scene, 0.25 + 1.0);
    assert!(!f.manager.is_tweening());
    assert_eq!(f.manager.elapsed_time(), 1.0);
    assert!((f.scene.get(f.sprite).unwrap().rotation - 90.0).abs() < 1e-4);
}

#[test]
fn test_switch_mid_tween_restarts_window() {
    let mut f = fixture();
    f.manager.run_sequence(&mut f.scene, "slide", 1.0).unwrap();
    f.manager.update(&mut f.scene, 0.5);

    f.manager.run_sequence(&mut f.scene, "fade", 1.0).unwrap();
    assert!(f.manager.is_tweening());
    assert_eq!(f.manager.running_sequence_name(), Some("fade"));
    // Properties only slide animates are back at their base values
    let sprite = f.scene.get(f.sprite).unwrap();
    assert_eq!(sprite.position, [10.0, 10.0]);
    assert_eq!(sprite.rotation, 0.0);
}

#[test]
fn test_removed_node_never_breaks_playback() {
    let mut f = fixture();
    let bystander = f.scene.insert(SceneNode::new("bystander"));
    f.manager
        .add_node(
            &f.scene,
            bystander,
            [(
                FADE,
                vec![track(
                    Property::Opacity,
                    vec![
                        Keyframe::new(0.0, PropertyValue::Number(0.0)),
                        Keyframe::new(1.0, PropertyValue::Number(1.0)),
                    ],
                )],
            )],
        )
        .unwrap();

    f.manager.run_sequence(&mut f.scene, "fade", 0.0).unwrap();
    f.scene.remove(f.sprite);
    let report = f.manager.update(&mut f.scene, 1.0);

    assert_eq!(report.completed, Some(FADE));
    assert_eq!(f.scene.get(bystander).unwrap().opacity, 1.0);
    assert_eq!(f.manager.bound_sequences(f.sprite), Vec::<SequenceId>::new());
    assert_eq!(f.manager.sequence(FADE).unwrap().track_count(), 1);
}

#[test]
fn test_prune_orphans_without_playback() {
    let mut f = fixture();
    f.scene.remove(f.sprite);
    assert_eq!(f.manager.prune_orphans(&f.scene), vec![f.sprite]);
    assert_eq!(f.manager.sequence(SLIDE).unwrap().track_count(), 0);
    assert!(f.manager.base_value(f.sprite, &Property::Rotation).is_err());
}

#[test]
fn test_callback_can_seek_on_next_update() {
    let mut f = fixture();
    f.manager.register_keyframe_callback("one", |_, requests| {
        requests.time_seek("slide", 2.5);
    });

    f.manager.run_sequence(&mut f.scene, "slide", 0.0).unwrap();
    f.manager.update(&mut f.scene, 1.0);
    assert_eq!(f.manager.elapsed_time(), 1.0);

    let report = f.manager.update(&mut f.scene, 0.0);
    assert_eq!(f.manager.elapsed_time(), 2.5);
    assert_eq!(report.fired_callbacks, vec!["two"]);
}

#[test]
fn test_completion_handler_can_restart_sequence() {
    let mut f = fixture();
    let runs = Rc::new(RefCell::new(0));
    let counter = runs.clone();
    f.manager.set_completed_callback(move |event, requests| {
        *counter.borrow_mut() += 1;
        requests.run_sequence(event.sequence_id, 0.0);
    });

    f.manager.run_sequence(&mut f.scene, "fade", 0.0).unwrap();
    f.manager.update(&mut f.scene, 1.0);
    f.manager.update(&mut f.scene, 1.0);
    f.manager.update(&mut f.scene, 0.5);
    assert_eq!(*runs.borrow(), 2);
    assert_eq!(f.manager.running_sequence_name(), Some("fade"));
}

#[test]
fn test_zero_length_sequence_completes_immediately() {
    let mut f = fixture();
    f.manager.add_sequence(Sequence::new(SequenceId(3), "blink", 0.0)).unwrap();
    f.manager.run_sequence(&mut f.scene, "blink", 0.0).unwrap();
    let report = f.manager.update(&mut f.scene, 0.0);
    assert_eq!(report.completed, Some(SequenceId(3)));
}
