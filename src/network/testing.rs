//! Server-side framing helpers shared by the network tests

use bytes::BytesMut;

use crate::protocol::{Encryption, EoWriter, Frame, FrameCodec, FrameDecoder, Packet};

/// Frame body (no length prefix) as the server would send `packet`.
///
/// The server obfuscates with the multiple the client decodes with.
pub fn server_frame<P: Packet>(packet: &P, client_decode_multiple: u8) -> BytesMut {
    let mut writer = EoWriter::new();
    packet.serialize(&mut writer).unwrap();

    let mut body: Vec<u8> = vec![P::ACTION.into(), P::FAMILY.into()];
    body.extend_from_slice(writer.as_slice());
    if !crate::protocol::is_raw(body[0], body[1]) {
        Encryption::new(client_decode_multiple, 0).encode(&mut body);
    }
    BytesMut::from(&body[..])
}

/// Same as [`server_frame`] with the length prefix, ready for a socket
pub fn server_wire<P: Packet>(packet: &P, client_decode_multiple: u8) -> Vec<u8> {
    let body = server_frame(packet, client_decode_multiple);
    let mut wire = crate::protocol::encode_number(body.len() as u32)[..2].to_vec();
    wire.extend_from_slice(&body);
    wire
}

/// Split client output into frames and decode them as the server would
pub fn client_frames(wire: &[u8], client_encode_multiple: u8) -> Vec<Frame> {
    let mut buf = BytesMut::from(wire);
    let mut decoder = FrameDecoder::new();
    let mut codec = FrameCodec::new();
    codec.set_encryption(Encryption::new(0, client_encode_multiple));

    let mut frames = Vec::new();
    while let Some(body) = decoder.decode(&mut buf).unwrap() {
        frames.push(codec.decode(body).unwrap());
    }
    assert!(buf.is_empty(), "trailing partial frame");
    frames
}
