//! Integration tests for PacketFramer with Tokio streams and for the
//! rejection paths of strict packet decoding.

use attraccess_protocol::{
    CardOpType, CardOperation, CommandType, Packet, PacketCodec, PacketFramer, ProtocolError,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rstest::rstest;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Framed, FramedRead};

/// Helper function to create a framed duplex stream for testing.
fn create_framed_duplex(
    buffer_size: usize,
) -> (
    Framed<DuplexStream, PacketFramer>,
    Framed<DuplexStream, PacketFramer>,
) {
    let (client, server) = tokio::io::duplex(buffer_size);
    (
        Framed::new(client, PacketFramer::new()),
        Framed::new(server, PacketFramer::new()),
    )
}

#[tokio::test]
async fn test_framed_roundtrip() {
    let (mut client, mut server) = create_framed_duplex(1024);

    let packet = Packet::new(7, CommandType::CardDetected.code(), &b"04ABCDEF"[..], 99);
    client.send(packet.clone()).await.unwrap();

    let received = server.next().await.unwrap().unwrap();
    assert_eq!(received, packet);
}

#[tokio::test]
async fn test_framed_multiple_packets_in_sequence() {
    let (mut client, mut server) = create_framed_duplex(1024);

    for id in 1..=5u16 {
        client
            .send(Packet::new(id, 0x10, vec![0x01, id as u8], 0))
            .await
            .unwrap();
    }

    for id in 1..=5u16 {
        let packet = server.next().await.unwrap().unwrap();
        assert_eq!(packet.cmd_id, id);
    }
}

#[tokio::test]
async fn test_framed_read_with_small_buffer() {
    let (mut writer, reader) = tokio::io::duplex(3);
    let mut framed = FramedRead::new(reader, PacketFramer::new());

    let wire = Packet::new(1, 0x40, vec![0x01], 0).to_bytes().unwrap();
    tokio::spawn(async move {
        writer.write_all(&wire).await.unwrap();
    });

    let packet = framed.next().await.unwrap().unwrap();
    assert_eq!(packet.cmd_type, 0x40);
    assert!(framed.next().await.is_none());
}

#[tokio::test]
async fn test_framed_read_reports_truncated_tail() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let mut framed = FramedRead::new(reader, PacketFramer::new());

    writer.write_all(&[0xBA, 0x71, 0x01, 0x00]).await.unwrap();
    drop(writer);

    let err = framed.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ProtocolError::Truncated { len: 4, .. }));
}

#[rstest]
#[case::empty(vec![], "truncated")]
#[case::short_header(vec![0xBA, 0x71, 0x01, 0x00, 0x01, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00], "truncated")]
#[case::bad_magic(vec![0xAB, 0xCD, 0x01, 0x00, 0x01, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], "magic")]
#[case::bad_version(vec![0xBA, 0x71, 0x02, 0x00, 0x01, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], "version")]
#[case::declared_overrun(vec![0xBA, 0x71, 0x01, 0x00, 0x01, 0x10, 0x00, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00], "truncated")]
fn test_decode_rejections(#[case] wire: Vec<u8>, #[case] expected: &str) {
    let err = PacketCodec::new().decode(&wire).unwrap_err();

    let kind = match err {
        ProtocolError::Truncated { .. } => "truncated",
        ProtocolError::BadMagic(_) => "magic",
        ProtocolError::UnsupportedVersion(_) => "version",
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(kind, expected);
}

#[test]
fn test_card_operation_command_flow() {
    let mut server = PacketCodec::new();
    let wire = server
        .encode(CommandType::CardOperation, &[0x01, 0x04, 0x90, 0x5A, 0x00, 0x00])
        .unwrap();

    let command = PacketCodec::new().decode(&wire).unwrap();
    assert_eq!(command.cmd_type, CommandType::CardOperation);

    let op = CardOperation::parse(&command.data).unwrap();
    assert_eq!(op.op_type, CardOpType::Transceive);
    assert_eq!(op.data, Bytes::from_static(&[0x90, 0x5A, 0x00, 0x00]));
}
