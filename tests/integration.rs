//! Integration tests for mqlink.
//!
//! These tests verify the integration between the codec, the frame decoder
//! and the frame writer.

use mqlink::codec::MsgPackCodec;
use mqlink::protocol::{build_frame, field, Fields, Frame, FrameBuffer, Header, Method, HEADER_SIZE};
use mqlink::writer::{FrameWriter, OutboundFrame};
use mqlink::MqError;

/// Test a publish frame from builder to decoded frame.
#[test]
fn test_publish_frame_roundtrip() {
    let frame = Frame::publish("orders", "eu.de", "direct", b"payload".to_vec());
    let bytes = build_frame(&frame).unwrap();

    let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
    assert_eq!(header.method_code, Method::Publish.code());
    assert_eq!(header.body_length, 7);

    let frames = FrameBuffer::new().push(&bytes).unwrap();
    assert_eq!(frames.len(), 1);

    let decoded = &frames[0];
    assert_eq!(decoded.method, Method::Publish);
    assert_eq!(decoded.queue(), "orders");
    assert_eq!(decoded.field(field::ROUTING_KEY), "eu.de");
    assert_eq!(decoded.field(field::PUB_TYPE), "direct");
    assert_eq!(decoded.body(), b"payload");
}

/// Test that the field section is a plain MsgPack string map.
#[test]
fn test_fields_are_msgpack_map() {
    let frame = Frame::bind("orders", "eu.*", true);
    let bytes = build_frame(&frame).unwrap();

    let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
    let fields_end = HEADER_SIZE + header.fields_length as usize;
    let fields = MsgPackCodec::decode_fields(&bytes[HEADER_SIZE..fields_end]).unwrap();

    let mut expected = Fields::new();
    expected.insert(field::QUEUE.to_string(), "orders".to_string());
    expected.insert(field::ROUTING_KEY.to_string(), "eu.*".to_string());
    expected.insert(field::NO_ACK.to_string(), "1".to_string());
    assert_eq!(fields, expected);
}

/// Test a mixed stream of pushes and responses, as the reader sees it.
#[test]
fn test_interleaved_push_and_response() {
    let mut all_bytes = Vec::new();
    all_bytes.extend(build_frame(&Frame::push("orders", "1", b"a".to_vec())).unwrap());
    all_bytes.extend(build_frame(&Frame::new(Method::PublishOk).with_body(b"42".to_vec())).unwrap());
    all_bytes.extend(build_frame(&Frame::push("orders", "2", b"b".to_vec())).unwrap());

    let frames = FrameBuffer::new().push(&all_bytes).unwrap();
    let methods: Vec<Method> = frames.iter().map(|f| f.method).collect();
    assert_eq!(methods, vec![Method::Push, Method::PublishOk, Method::Push]);

    assert_eq!(frames[0].msg_id(), "1");
    assert_eq!(frames[1].body(), b"42");
    assert_eq!(frames[2].msg_id(), "2");
}

/// Test decoding a stream delivered one byte at a time.
#[test]
fn test_byte_by_byte_stream() {
    let mut all_bytes = Vec::new();
    for i in 0..5 {
        let frame = Frame::push("q", &i.to_string(), format!("message_{}", i).into_bytes());
        all_bytes.extend(build_frame(&frame).unwrap());
    }

    let mut buffer = FrameBuffer::new();
    let mut frames = Vec::new();
    for byte in &all_bytes {
        frames.extend(buffer.push(std::slice::from_ref(byte)).unwrap());
    }

    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.msg_id(), i.to_string());
        assert_eq!(frame.body(), format!("message_{}", i).as_bytes());
    }
    assert!(buffer.is_empty());
}

/// Test error frame pattern.
#[test]
fn test_error_frame() {
    let bytes = build_frame(&Frame::error("bad auth", 401)).unwrap();
    let frames = FrameBuffer::new().push(&bytes).unwrap();

    assert_eq!(frames[0].method, Method::Error);
    assert_eq!(frames[0].code(), "401");
    assert_eq!(frames[0].body(), b"bad auth");
}

/// Test that an oversized frame is rejected before its payload arrives.
#[test]
fn test_oversized_frame_rejected() {
    let header = Header::new(Method::Publish, 0, 1024);
    let mut buffer = FrameBuffer::with_max_payload(512);

    let err = buffer.push(&header.encode()).unwrap_err();
    assert!(matches!(err, MqError::Protocol(_)));
}

/// Test that an unknown method code is a decode failure.
#[test]
fn test_unknown_method_rejected() {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes[..4].copy_from_slice(&99u32.to_be_bytes());

    let err = FrameBuffer::new().push(&bytes).unwrap_err();
    assert!(matches!(err, MqError::Protocol(_)));
}

/// Test frames written through the frame writer decode on the other side.
#[tokio::test]
async fn test_writer_to_decoder() {
    use tokio::io::AsyncReadExt;

    let (client, mut server) = tokio::io::duplex(1024);
    let writer = FrameWriter::new(Box::new(client));

    let frames = [
        Frame::auth("5f4dcc3b5aa765d61d8327deb882cf99"),
        Frame::heartbeat(),
        Frame::ack("orders", "7"),
    ];
    let mut total = 0;
    for frame in &frames {
        let outbound = OutboundFrame::encode(frame).unwrap();
        total += outbound.size();
        writer.write_frame(&outbound).await.unwrap();
    }

    let mut buf = vec![0u8; total];
    server.read_exact(&mut buf).await.unwrap();

    let decoded = FrameBuffer::new().push(&buf).unwrap();
    assert_eq!(decoded, frames.to_vec());
}
