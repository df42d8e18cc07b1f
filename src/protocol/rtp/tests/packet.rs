use crate::protocol::ParseError;
use crate::protocol::rtp::constants::PAYLOAD_TYPE_MIDI;
use crate::protocol::rtp::{RtpDecodeError, RtpHeader};

#[test]
fn test_header_encode_layout() {
    let header = RtpHeader::new_midi(0x0102, 0x0304_0506, 0x0708_090A);
    let bytes = header.encode();

    assert_eq!(bytes[0], 0x80); // V=2, no P/X/CC
    assert_eq!(bytes[1], PAYLOAD_TYPE_MIDI);
    assert_eq!(&bytes[2..4], &[0x01, 0x02]);
    assert_eq!(&bytes[4..8], &[0x03, 0x04, 0x05, 0x06]);
    assert_eq!(&bytes[8..12], &[0x07, 0x08, 0x09, 0x0A]);
}

#[test]
fn test_header_decode() {
    let header = RtpHeader::new_midi(7, 1000, 0xDEAD_BEEF);
    let (decoded, len) = RtpHeader::decode(&header.encode()).unwrap();

    assert_eq!(len, 12);
    assert_eq!(decoded, header);
}

#[test]
fn test_header_too_small() {
    let result = RtpHeader::decode(&[0x80, 0x61, 0x00]);
    assert!(matches!(
        result,
        Err(RtpDecodeError::BufferTooSmall {
            needed: 12,
            have: 3
        })
    ));
}

#[test]
fn test_header_wrong_version() {
    let mut bytes = RtpHeader::new_midi(0, 0, 0).encode();
    bytes[0] = 0x40; // V=1
    let err = RtpHeader::decode(&bytes).unwrap_err();
    assert!(matches!(err, RtpDecodeError::InvalidVersion(1)));
    assert_eq!(ParseError::from(err), ParseError::UnexpectedData);
}

#[test]
fn test_header_wrong_payload_type() {
    let mut bytes = RtpHeader::new_midi(0, 0, 0).encode();
    bytes[1] = 0x60;
    let err = RtpHeader::decode(&bytes).unwrap_err();
    assert!(matches!(err, RtpDecodeError::UnknownPayloadType(0x60)));
}

#[test]
fn test_marker_bit_is_ignored_for_payload_type() {
    let mut bytes = RtpHeader::new_midi(0, 0, 0).encode();
    bytes[1] |= 0x80;
    let (header, _) = RtpHeader::decode(&bytes).unwrap();
    assert!(header.marker);
    assert_eq!(header.payload_type, PAYLOAD_TYPE_MIDI);
}

#[test]
fn test_header_skips_csrc_and_extension() {
    let mut bytes = RtpHeader::new_midi(1, 2, 3).encode().to_vec();
    bytes[0] |= 0x10 | 0x02; // X=1, CC=2
    bytes.extend_from_slice(&[0u8; 8]); // two CSRC entries
    bytes.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01]); // extension header, one word
    bytes.extend_from_slice(&[0u8; 4]);

    let (header, len) = RtpHeader::decode(&bytes).unwrap();
    assert_eq!(header.csrc_count, 2);
    assert!(header.extension);
    assert_eq!(len, 12 + 8 + 4 + 4);

    // One byte short of the extension body
    let err = RtpHeader::decode(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_eq!(ParseError::from(err), ParseError::NotEnoughData);
}

#[test]
fn test_decode_error_messages() {
    let short = RtpDecodeError::BufferTooSmall { needed: 12, have: 4 };
    assert_eq!(short.to_string(), "buffer too small: need 12 bytes, have 4");
    assert_eq!(ParseError::from(short), ParseError::NotEnoughData);
    assert_eq!(
        RtpDecodeError::UnknownPayloadType(0x60).to_string(),
        "unknown payload type: 0x60"
    );
}
