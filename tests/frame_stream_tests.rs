use headunit_wire::frame::{
    ControlFrameInfo, Frame, FrameCodec, FrameDecodeError, FrameStreamDecoder, FrameType,
    ServiceType,
};
use rand::Rng;
use rand::seq::SliceRandom;

fn data_frame(version: u8, session_id: u8, message_id: u32, payload: &[u8]) -> Frame {
    Frame {
        version,
        encrypted: false,
        frame_type: FrameType::Single,
        service_type: ServiceType::Rpc,
        frame_info: 0,
        session_id,
        message_id,
        payload: payload.to_vec(),
    }
}

#[test]
fn decoder_handles_incomplete_input() {
    let frame = data_frame(2, 5, 9, b"xyz");

    let full = FrameCodec::encode(&frame);
    let split = full.split_at(full.len() / 2);

    let mut decoder = FrameStreamDecoder::default();

    {
        let decoded_frames: Vec<_> = decoder.read_bytes(split.0).collect();
        assert_eq!(decoded_frames.len(), 0); // Incomplete frame
    }

    let decoded_frames: Vec<_> = decoder.read_bytes(split.1).collect();
    assert_eq!(decoded_frames.len(), 1); // Now complete

    let out = decoded_frames[0].as_ref().expect("expected valid frame");
    assert_eq!(out, &frame);
    assert_eq!(decoder.buffered_len(), 0);
}

#[test]
fn decoder_recovers_frames_from_random_chunking() {
    let mut rng = rand::rng();

    let frames: Vec<Frame> = (0..50u32)
        .map(|i| {
            let version = if i % 3 == 0 { 1 } else { 2 };
            let len = rng.random_range(0..300);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let mut frame = data_frame(version, (i % 7 + 1) as u8, i, &payload);
            if version == 1 {
                frame.message_id = 0; // Not transmitted by v1 headers
            }
            frame
        })
        .collect();

    let stream: Vec<u8> = frames.iter().flat_map(FrameCodec::encode).collect();

    let mut decoder = FrameStreamDecoder::default();
    let mut decoded = vec![];
    let mut offset = 0;

    while offset < stream.len() {
        let take = rng.random_range(1..=64).min(stream.len() - offset);
        for result in decoder.read_bytes(&stream[offset..offset + take]) {
            decoded.push(result.expect("decode failed"));
        }
        offset += take;
    }

    assert_eq!(decoded, frames);
}

#[test]
fn decoder_yields_all_frames_of_one_chunk_in_order() {
    let mut frames = vec![
        data_frame(2, 1, 1, b"one"),
        Frame::control(2, ServiceType::Control, ControlFrameInfo::Heartbeat, 1, 0),
        data_frame(1, 2, 0, b"three"),
    ];
    frames.shuffle(&mut rand::rng());

    let stream: Vec<u8> = frames.iter().flat_map(FrameCodec::encode).collect();

    let mut decoder = FrameStreamDecoder::default();
    let decoded: Vec<Frame> = decoder
        .read_bytes(&stream)
        .map(|r| r.expect("decode failed"))
        .collect();

    assert_eq!(decoded, frames);
}

#[test]
fn unsupported_version_drops_the_buffer() {
    let mut bytes = FrameCodec::encode(&data_frame(2, 1, 1, b"abc"));
    bytes[0] = 0x71; // version 7

    let mut decoder = FrameStreamDecoder::default();
    let results: Vec<_> = decoder.read_bytes(&bytes).collect();

    assert_eq!(results, vec![Err(FrameDecodeError::UnsupportedVersion(7))]);
    assert_eq!(decoder.buffered_len(), 0);

    // The next well-formed chunk decodes normally
    let good = data_frame(2, 1, 2, b"ok");
    let results: Vec<_> = decoder.read_bytes(&FrameCodec::encode(&good)).collect();
    assert_eq!(results, vec![Ok(good)]);
}

#[test]
fn codec_reports_truncated_payload() {
    let bytes = FrameCodec::encode(&data_frame(2, 1, 1, b"abcdef"));

    assert_eq!(
        FrameCodec::decode(&bytes[..14]),
        Err(FrameDecodeError::IncompletePayload {
            needed: 18,
            available: 14,
        })
    );
}

#[test]
fn encrypted_flag_round_trips() {
    let mut frame = data_frame(3, 4, 8, b"sealed");
    frame.encrypted = true;

    let bytes = FrameCodec::encode(&frame);
    assert_eq!(bytes[0], 0x39);

    assert_eq!(FrameCodec::decode(&bytes), Ok(frame));
}
