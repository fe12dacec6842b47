use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::Bytes;

use super::HandoffBridge;
use crate::{
    error::BridgeError,
    mock::{Event, MockPipeline, Reaction},
};

fn frame(n: u8) -> Bytes {
    Bytes::from(vec![0, 0, 0, 1, n])
}

fn exchange_data(bridge: &mut HandoffBridge<MockPipeline>, input: &Bytes) -> Option<Vec<u8>> {
    bridge
        .exchange(input)
        .expect("session is running")
        .map(|view| view.data().to_vec())
}

fn position(events: &[Event], event: &Event) -> usize {
    events
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("missing {:?} in {:?}", event, events))
}

#[test]
fn test_one_frame_per_exchange() {
    let mut bridge = HandoffBridge::start(MockPipeline::new([])).unwrap();

    for i in 0..5u8 {
        let start = Instant::now();
        let out = exchange_data(&mut bridge, &frame(i));
        assert_eq!(out, Some(format!("frame-{}", i).into_bytes()));
        // Returned only after the engine's callback, not before.
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
    assert_eq!(bridge.pending_outputs(), 0);
}

#[test]
fn test_surplus_frame_served_on_next_exchange() {
    let mut bridge =
        HandoffBridge::start(MockPipeline::new([Reaction::Samples(2), Reaction::NeedData]))
            .unwrap();

    assert_eq!(exchange_data(&mut bridge, &frame(0)), Some(b"frame-0".to_vec()));
    assert_eq!(exchange_data(&mut bridge, &frame(1)), Some(b"frame-1".to_vec()));

    bridge.stop();
    assert_eq!(bridge.pending_outputs(), 0);
}

#[test]
fn test_need_data_only_returns_no_frame() {
    let pipeline = MockPipeline::new([]).fallback(Reaction::NeedData);
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    for i in 0..3u8 {
        let start = Instant::now();
        assert_eq!(exchange_data(&mut bridge, &frame(i)), None);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
    assert_eq!(bridge.pending_outputs(), 0);
}

#[test]
fn test_input_reference_lifetime() {
    struct Message {
        payload: Vec<u8>,
        drops: Arc<AtomicUsize>,
    }
    impl AsRef<[u8]> for Message {
        fn as_ref(&self) -> &[u8] {
            &self.payload
        }
    }
    impl Drop for Message {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    let pipeline = MockPipeline::new([]).hold_inputs();
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    let drops = Arc::new(AtomicUsize::new(0));
    let input = Bytes::from_owner(Message {
        payload: vec![0, 0, 0, 1, 0x65],
        drops: drops.clone(),
    });

    assert!(exchange_data(&mut bridge, &input).is_some());
    // The engine still holds its reference, the caller's one is intact.
    assert_eq!(bridge.inputs_in_flight(), 1);
    assert_eq!(&input[..], &[0, 0, 0, 1, 0x65]);

    probe.drop_held();
    assert_eq!(bridge.inputs_in_flight(), 0);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(input);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_previous_output_released_before_next_submit() {
    let pipeline = MockPipeline::new([]);
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    assert!(exchange_data(&mut bridge, &frame(0)).is_some());
    assert!(exchange_data(&mut bridge, &frame(1)).is_some());

    let events = probe.events();
    let unmapped = position(&events, &Event::Unmapped(0));
    let released = position(&events, &Event::Released(0));
    let submitted = position(&events, &Event::Submitted(2));
    assert!(unmapped < released);
    assert!(released < submitted);
}

#[test]
fn test_rejected_submission_does_not_block() {
    let pipeline = MockPipeline::new([]).fallback(Reaction::Reject);
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    for i in 0..4u8 {
        let start = Instant::now();
        assert_eq!(exchange_data(&mut bridge, &frame(i)), None);
        assert!(start.elapsed() < Duration::from_millis(15));
    }
    assert_eq!(bridge.inputs_in_flight(), 0);
    assert_eq!(
        probe
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Submitted(_)))
            .count(),
        4
    );
}

#[test]
fn test_session_recovers_after_rejected_submission() {
    let mut bridge =
        HandoffBridge::start(MockPipeline::new([Reaction::Reject, Reaction::Samples(1)]))
            .unwrap();

    assert_eq!(exchange_data(&mut bridge, &frame(0)), None);
    assert_eq!(exchange_data(&mut bridge, &frame(1)), Some(b"frame-0".to_vec()));
}

#[test]
fn test_empty_frame_is_not_submitted() {
    let pipeline = MockPipeline::new([]);
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    assert_eq!(exchange_data(&mut bridge, &Bytes::new()), None);
    assert!(
        !probe
            .events()
            .iter()
            .any(|e| matches!(e, Event::Submitted(_)))
    );
}

#[test]
fn test_failed_pull_yields_no_frame() {
    let pipeline = MockPipeline::new([Reaction::Phantom, Reaction::Samples(1)]);
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    assert_eq!(exchange_data(&mut bridge, &frame(0)), None);
    assert_eq!(bridge.pending_outputs(), 0);
    assert_eq!(probe.queued(), 0);

    assert_eq!(exchange_data(&mut bridge, &frame(1)), Some(b"frame-0".to_vec()));
}

#[test]
fn test_unmappable_sample_released_on_next_exchange() {
    let pipeline = MockPipeline::new([Reaction::Unmappable, Reaction::NeedData]);
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    assert_eq!(exchange_data(&mut bridge, &frame(0)), None);
    assert!(!probe.events().contains(&Event::Released(0)));

    assert_eq!(exchange_data(&mut bridge, &frame(1)), None);
    let events = probe.events();
    assert!(events.contains(&Event::Released(0)));
    assert!(!events.contains(&Event::Unmapped(0)));
}

#[test]
fn test_teardown_releases_output_then_stops() {
    let pipeline = MockPipeline::new([]);
    let probe = pipeline.probe();
    let mut bridge = HandoffBridge::start(pipeline).unwrap();

    assert!(exchange_data(&mut bridge, &frame(0)).is_some());
    assert!(bridge.current().is_some());
    drop(bridge);

    let events = probe.events();
    let unmapped = position(&events, &Event::Unmapped(0));
    let released = position(&events, &Event::Released(0));
    let stopped = position(&events, &Event::Stopped);
    assert!(unmapped < released);
    assert!(released < stopped);
    assert_eq!(events.iter().filter(|e| **e == Event::Stopped).count(), 1);
}

#[test]
fn test_exchange_after_stop_fails() {
    let mut bridge = HandoffBridge::start(MockPipeline::new([])).unwrap();
    bridge.stop();
    bridge.stop();
    assert!(bridge.is_stopped());
    assert!(matches!(bridge.exchange(&frame(0)), Err(BridgeError::Stopped)));
}

#[test]
fn test_start_failure_is_construction_error() {
    let result = HandoffBridge::start(MockPipeline::new([]).fail_start());
    assert!(matches!(result, Err(BridgeError::Construction(_))));
}
