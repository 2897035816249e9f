use headunit_wire::{
    engine::ProtocolError,
    frame::{
        Frame, FrameDecodeError, FrameFragmenter, FrameReassembler, FrameType, ReassemblyLimits,
        ReassemblyOutcome, ServiceType,
    },
};
use std::time::{Duration, Instant};

fn fragments(session_id: u8, message_id: u32, payload: &[u8]) -> Vec<Frame> {
    FrameFragmenter::new(2, 12 + 16, ServiceType::Audio, session_id, message_id)
        .unwrap()
        .fragment(payload)
        .unwrap()
}

fn consecutive(session_id: u8, message_id: u32, frame_info: u8, payload: &[u8]) -> Frame {
    Frame {
        version: 2,
        encrypted: false,
        frame_type: FrameType::Consecutive,
        service_type: ServiceType::Audio,
        frame_info,
        session_id,
        message_id,
        payload: payload.to_vec(),
    }
}

#[test]
fn scenario_d_orphan_consecutive_frame_is_dropped() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();

    // Another session is mid-message
    let other = fragments(4, 9, &[3u8; 40]);
    assert_eq!(
        reassembler.accept(other[0].clone(), now),
        ReassemblyOutcome::Pending
    );
    assert_eq!(
        reassembler.accept(other[1].clone(), now),
        ReassemblyOutcome::Pending
    );

    let outcome = reassembler.accept(consecutive(3, 9, 1, b"lost"), now);
    assert_eq!(
        outcome,
        ReassemblyOutcome::Dropped(ProtocolError::UnknownReassemblyTarget {
            session_id: 3,
            message_id: 9,
        })
    );

    // Session 4 is unaffected
    let mut last = ReassemblyOutcome::Pending;
    for frame in other.into_iter().skip(2) {
        last = reassembler.accept(frame, now);
    }
    let ReassemblyOutcome::Complete(msg) = last else {
        panic!("expected completion, got {last:?}");
    };
    assert_eq!(msg.session_id, 4);
    assert_eq!(msg.bulk_payload, Some(vec![3u8; 40]));
}

#[test]
fn same_message_id_on_two_sessions_does_not_collide() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();

    let a = fragments(1, 5, &[0xAA; 33]);
    let b = fragments(2, 5, &[0xBB; 33]);

    let mut completed = vec![];
    for (fa, fb) in a.into_iter().zip(b) {
        for frame in [fa, fb] {
            if let ReassemblyOutcome::Complete(msg) = reassembler.accept(frame, now) {
                completed.push(msg);
            }
        }
    }

    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].bulk_payload, Some(vec![0xAA; 33]));
    assert_eq!(completed[1].bulk_payload, Some(vec![0xBB; 33]));
}

#[test]
fn duplicate_first_frame_is_reported_and_replaces_the_context() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();

    let stale = fragments(1, 2, &[1u8; 20]);
    let fresh = fragments(1, 2, &[2u8; 30]);

    reassembler.accept(stale[0].clone(), now);
    reassembler.accept(stale[1].clone(), now);

    assert_eq!(
        reassembler.accept(fresh[0].clone(), now),
        ReassemblyOutcome::Displaced(ProtocolError::DuplicateFirstFrame {
            session_id: 1,
            message_id: 2,
        })
    );
    assert_eq!(reassembler.in_flight(), 1);

    let mut last = ReassemblyOutcome::Pending;
    for frame in fresh.into_iter().skip(1) {
        last = reassembler.accept(frame, now);
    }
    let ReassemblyOutcome::Complete(msg) = last else {
        panic!("expected completion, got {last:?}");
    };
    assert_eq!(msg.bulk_payload, Some(vec![2u8; 30]));
}

#[test]
fn abandoned_contexts_expire() {
    let start = Instant::now();
    let mut reassembler = FrameReassembler::new(ReassemblyLimits {
        timeout: Duration::from_secs(2),
        ..ReassemblyLimits::default()
    });

    let frames = fragments(6, 1, &[0u8; 50]);
    reassembler.accept(frames[0].clone(), start);

    assert!(
        reassembler
            .evict_expired(start + Duration::from_secs(1))
            .is_empty()
    );

    let expired = reassembler.evict_expired(start + Duration::from_secs(2));
    assert_eq!(
        expired,
        vec![ProtocolError::ReassemblyExpired {
            session_id: 6,
            message_id: 1,
            age: Duration::from_secs(2),
        }]
    );
    assert_eq!(reassembler.in_flight(), 0);

    // Late fragments now have nowhere to go
    assert!(matches!(
        reassembler.accept(frames[1].clone(), start + Duration::from_secs(3)),
        ReassemblyOutcome::Dropped(ProtocolError::UnknownReassemblyTarget { .. })
    ));
}

#[test]
fn context_limit_evicts_the_oldest() {
    let start = Instant::now();
    let mut reassembler = FrameReassembler::new(ReassemblyLimits {
        max_contexts: 2,
        ..ReassemblyLimits::default()
    });

    reassembler.accept(fragments(1, 1, &[0u8; 40])[0].clone(), start);
    reassembler.accept(
        fragments(1, 2, &[0u8; 40])[0].clone(),
        start + Duration::from_millis(1),
    );

    assert_eq!(
        reassembler.accept(
            fragments(1, 3, &[0u8; 40])[0].clone(),
            start + Duration::from_millis(2)
        ),
        ReassemblyOutcome::Displaced(ProtocolError::ReassemblyEvicted {
            session_id: 1,
            message_id: 1,
        })
    );
    assert_eq!(reassembler.in_flight(), 2);
}

#[test]
fn oversized_declaration_is_refused() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::new(ReassemblyLimits {
        max_message_size: 32,
        ..ReassemblyLimits::default()
    });

    let frames = fragments(1, 1, &[0u8; 33]);
    assert_eq!(
        reassembler.accept(frames[0].clone(), now),
        ReassemblyOutcome::Dropped(ProtocolError::MessageTooLarge {
            session_id: 1,
            message_id: 1,
            size: 33,
            max: 32,
        })
    );
    assert_eq!(reassembler.in_flight(), 0);
}

#[test]
fn declared_size_is_not_reserved_up_front() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();
    let declared = ReassemblyLimits::default().max_message_size as u32;

    // Every context the limits allow, each announcing the largest message
    for message_id in 0..64u32 {
        let mut payload = declared.to_be_bytes().to_vec();
        payload.extend(&1u32.to_be_bytes());

        let first = Frame {
            frame_type: FrameType::First,
            frame_info: 0,
            payload,
            ..consecutive(1, message_id, 0, &[])
        };
        assert_eq!(reassembler.accept(first, now), ReassemblyOutcome::Pending);
    }

    assert_eq!(reassembler.in_flight(), 64);
    assert_eq!(reassembler.buffered_bytes(), 0);

    // Memory follows the bytes that actually arrive
    reassembler.accept(consecutive(1, 0, 1, &[7u8; 16]), now);
    assert!(reassembler.buffered_bytes() < 1024);
}

#[test]
fn overflow_and_short_messages_are_dropped() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();

    // Declares 20 bytes, then sends 32
    let frames = fragments(1, 1, &[0u8; 20]);
    reassembler.accept(frames[0].clone(), now);
    reassembler.accept(consecutive(1, 1, 1, &[0u8; 16]), now);
    assert_eq!(
        reassembler.accept(consecutive(1, 1, 0, &[0u8; 16]), now),
        ReassemblyOutcome::Dropped(ProtocolError::ReassemblyOverflow {
            session_id: 1,
            message_id: 1,
            declared: 20,
        })
    );

    // Declares 20 bytes, terminates after 16
    reassembler.accept(frames[0].clone(), now);
    assert_eq!(
        reassembler.accept(consecutive(1, 1, 0, &[0u8; 16]), now),
        ReassemblyOutcome::Dropped(ProtocolError::ReassemblySizeMismatch {
            session_id: 1,
            message_id: 1,
            declared: 20,
            received: 16,
        })
    );
    assert_eq!(reassembler.in_flight(), 0);
}

#[test]
fn malformed_first_frame_is_a_format_error() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();

    let mut first = fragments(1, 1, &[0u8; 40]).remove(0);
    first.payload.truncate(5);

    assert_eq!(
        reassembler.accept(first, now),
        ReassemblyOutcome::Dropped(ProtocolError::Format(
            FrameDecodeError::MalformedFirstFrame(5)
        ))
    );
}

#[test]
fn purge_session_only_touches_that_session() {
    let now = Instant::now();
    let mut reassembler = FrameReassembler::default();

    reassembler.accept(fragments(1, 1, &[0u8; 40])[0].clone(), now);
    reassembler.accept(fragments(1, 2, &[0u8; 40])[0].clone(), now);
    reassembler.accept(fragments(2, 1, &[0u8; 40])[0].clone(), now);

    assert_eq!(reassembler.purge_session(1), 2);
    assert_eq!(reassembler.in_flight(), 1);
}
