use super::*;

// -------------------- Round-trips --------------------

#[test]
fn roundtrip_live_entry() {
    let e = Entry::put(b"hello".to_vec(), b"world".to_vec(), 42);
    let bytes = e.encode();
    assert_eq!(bytes.len(), e.encoded_len());
    assert_eq!(Entry::decode(&bytes).unwrap(), e);
}

#[test]
fn roundtrip_tombstone() {
    let e = Entry::tombstone(b"gone".to_vec(), 7);
    let decoded = Entry::decode(&e.encode()).unwrap();
    assert!(decoded.tombstone);
    assert!(decoded.value.is_empty());
    assert_eq!(decoded.version, 7);
}

#[test]
fn roundtrip_empty_value() {
    let e = Entry::put(b"k".to_vec(), b"".to_vec(), 1);
    assert_eq!(Entry::decode(&e.encode()).unwrap(), e);
}

#[test]
fn roundtrip_binary_key_and_value() {
    let e = Entry::put(vec![0x00u8, 0xFF, 0x80], vec![0xDEu8, 0xAD, 0xBE, 0xEF], 9);
    assert_eq!(Entry::decode(&e.encode()).unwrap(), e);
}

#[test]
fn roundtrip_version_extremes() {
    for version in [0u64, 1, u64::MAX] {
        let e = Entry::put(b"k".to_vec(), b"v".to_vec(), version);
        assert_eq!(Entry::decode(&e.encode()).unwrap().version, version);
    }
}

#[test]
fn roundtrip_large_value() {
    let e = Entry::put(b"big".to_vec(), vec![b'x'; 1_000_000], 3);
    let decoded = Entry::decode(&e.encode()).unwrap();
    assert_eq!(decoded.value.len(), 1_000_000);
}

// -------------------- Determinism --------------------

#[test]
fn encode_is_deterministic() {
    let e = Entry::put(b"a".to_vec(), b"b".to_vec(), 5);
    assert_eq!(e.encode(), e.encode());
}

#[test]
fn encode_into_appends() {
    let a = Entry::put(b"a".to_vec(), b"1".to_vec(), 1);
    let b = Entry::put(b"b".to_vec(), b"2".to_vec(), 2);
    let mut buf = Vec::new();
    a.encode_into(&mut buf);
    b.encode_into(&mut buf);
    assert_eq!(buf.len(), a.encoded_len() + b.encoded_len());
    assert_eq!(Entry::decode(&buf[..a.encoded_len()]).unwrap(), a);
    assert_eq!(Entry::decode(&buf[a.encoded_len()..]).unwrap(), b);
}

// -------------------- Malformed input --------------------

#[test]
fn decode_empty_slice_fails() {
    assert!(matches!(Entry::decode(b""), Err(CodecError::Io(_))));
}

#[test]
fn decode_truncated_key_fails() {
    // key_len says 100 but only 2 bytes follow
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&100u32.to_le_bytes());
    bytes.extend_from_slice(b"ab");
    assert!(matches!(
        Entry::decode(&bytes),
        Err(CodecError::Truncated)
    ));
}

#[test]
fn decode_truncated_value_fails() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(b"k");
    bytes.extend_from_slice(&50u32.to_le_bytes());
    bytes.extend_from_slice(b"v");
    assert!(matches!(
        Entry::decode(&bytes),
        Err(CodecError::Truncated)
    ));
}

#[test]
fn decode_missing_version_fails() {
    let e = Entry::put(b"k".to_vec(), b"v".to_vec(), 1);
    let bytes = e.encode();
    let result = Entry::decode(&bytes[..bytes.len() - 8]);
    assert!(matches!(result, Err(CodecError::Io(_))));
}

#[test]
fn decode_bad_tombstone_byte_fails() {
    let e = Entry::put(b"k".to_vec(), b"v".to_vec(), 1);
    let mut bytes = e.encode();
    let tombstone_pos = bytes.len() - 9;
    bytes[tombstone_pos] = 0x7F;
    assert!(matches!(
        Entry::decode(&bytes),
        Err(CodecError::InvalidTombstone(0x7F))
    ));
}

#[test]
fn decode_trailing_bytes_fails() {
    let e = Entry::put(b"k".to_vec(), b"v".to_vec(), 1);
    let mut bytes = e.encode();
    bytes.push(0xAB);
    assert!(matches!(
        Entry::decode(&bytes),
        Err(CodecError::TrailingBytes(1))
    ));
}
