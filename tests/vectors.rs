//! Wire-format vectors exercised through the public API.

use cborstream::{
    from_slice, from_slice_native, from_slice_with, is_canonical, iter_slice, to_canonical_vec,
    to_vec, to_vec_native, CanonicalCbor, DecodeOptions, Encoder, ErrorCode, ErrorKind, Event,
    EventDecoder, Item, ReaderSource, Registry, SliceSource, Source, Value, VecSink, WriterSink,
};
use hex_literal::hex;
use time::macros::datetime;

fn roundtrip(item: &Item, expected: &[u8]) {
    let bytes = to_vec(item).expect("encode");
    assert_eq!(bytes, expected, "encoding mismatch for {item:?}");
    assert_eq!(&from_slice(&bytes).expect("decode"), item);
}

#[test]
fn integer_vectors() {
    roundtrip(&Item::Unsigned(0), &hex!("00"));
    roundtrip(&Item::Unsigned(10), &hex!("0a"));
    roundtrip(&Item::Unsigned(23), &hex!("17"));
    roundtrip(&Item::Unsigned(24), &hex!("1818"));
    roundtrip(&Item::Unsigned(25), &hex!("1819"));
    roundtrip(&Item::Unsigned(100), &hex!("1864"));
    roundtrip(&Item::Unsigned(1000), &hex!("1903e8"));
    roundtrip(&Item::Unsigned(1_000_000), &hex!("1a000f4240"));
    roundtrip(&Item::Unsigned(1_000_000_000_000), &hex!("1b000000e8d4a51000"));
    roundtrip(
        &Item::Unsigned(18_446_744_073_709_551_615),
        &hex!("1bffffffffffffffff"),
    );
    roundtrip(&Item::Negative(0), &hex!("20"));
    roundtrip(&Item::Negative(9), &hex!("29"));
    roundtrip(&Item::Negative(99), &hex!("3863"));
    roundtrip(&Item::Negative(999), &hex!("3903e7"));
}

#[test]
fn string_vectors() {
    roundtrip(&Item::Bytes(vec![]), &hex!("40"));
    roundtrip(&Item::Bytes(vec![1, 2, 3, 4]), &hex!("4401020304"));
    roundtrip(&Item::Text(String::new()), &hex!("60"));
    roundtrip(&Item::Text("a".into()), &hex!("6161"));
    roundtrip(&Item::Text("IETF".into()), &hex!("6449455446"));
    roundtrip(&Item::Text("\"\\".into()), &hex!("62225c"));
    roundtrip(&Item::Text("\u{fc}".into()), &hex!("62c3bc"));
    roundtrip(&Item::Text("\u{6c34}".into()), &hex!("63e6b0b4"));
}

#[test]
fn container_vectors() {
    roundtrip(&Item::Array(vec![]), &hex!("80"));
    roundtrip(
        &Item::Array(vec![
            Item::Unsigned(1),
            Item::Unsigned(2),
            Item::Unsigned(3),
        ]),
        &hex!("83010203"),
    );
    roundtrip(
        &Item::Array(vec![
            Item::Unsigned(1),
            Item::Array(vec![Item::Unsigned(2), Item::Unsigned(3)]),
            Item::Array(vec![Item::Unsigned(4), Item::Unsigned(5)]),
        ]),
        &hex!("8301820203820405"),
    );
    roundtrip(
        &Item::Map(vec![
            (Item::Unsigned(1), Item::Unsigned(2)),
            (Item::Unsigned(3), Item::Unsigned(4)),
        ]),
        &hex!("a201020304"),
    );
    roundtrip(
        &Item::Array(vec![
            Item::Text("a".into()),
            Item::Map(vec![(Item::Text("b".into()), Item::Text("c".into()))]),
        ]),
        &hex!("826161a161626163"),
    );
}

#[test]
fn indefinite_vectors() {
    roundtrip(&Item::IndefiniteArray(vec![]), &hex!("9fff"));
    let one_chunk = from_slice(&hex!("5f4101ff")).unwrap();
    assert_eq!(one_chunk, Item::BytesChunks(vec![vec![1]]));
    assert_eq!(one_chunk, Item::Bytes(vec![1]));
    roundtrip(
        &Item::BytesChunks(vec![vec![1, 2], vec![3, 4, 5]]),
        &hex!("5f42010243030405ff"),
    );
    roundtrip(
        &Item::TextChunks(vec!["strea".into(), "ming".into()]),
        &hex!("7f657374726561646d696e67ff"),
    );
    roundtrip(
        &Item::IndefiniteMap(vec![
            (Item::Text("a".into()), Item::Unsigned(1)),
            (Item::Text("b".into()), Item::IndefiniteArray(vec![
                Item::Unsigned(2),
                Item::Unsigned(3),
            ])),
        ]),
        &hex!("bf61610161629f0203ffff"),
    );
}

#[test]
fn simple_and_float_vectors() {
    roundtrip(&Item::FALSE, &hex!("f4"));
    roundtrip(&Item::TRUE, &hex!("f5"));
    roundtrip(&Item::NULL, &hex!("f6"));
    roundtrip(&Item::UNDEFINED, &hex!("f7"));
    roundtrip(&Item::Simple(16), &hex!("f0"));
    roundtrip(&Item::Simple(255), &hex!("f8ff"));

    assert_eq!(from_slice(&hex!("f90000")).unwrap(), Item::Float(0.0));
    assert_eq!(from_slice(&hex!("f93c00")).unwrap(), Item::Float(1.0));
    assert_eq!(from_slice(&hex!("f97c00")).unwrap(), Item::Float(f64::INFINITY));
    assert_eq!(
        from_slice(&hex!("fa47c35000")).unwrap(),
        Item::Float(100_000.0)
    );
    assert_eq!(
        from_slice(&hex!("fb7e37e43c8800759c")).unwrap(),
        Item::Float(1.0e300)
    );
}

#[test]
fn malformed_inputs() {
    for (bytes, code) in [
        (&hex!("1c")[..], ErrorCode::ReservedAdditionalInfo),
        (&hex!("f81f"), ErrorCode::InvalidSimpleValue),
        (&hex!("ff"), ErrorCode::MisplacedBreak),
        (&hex!("81ff"), ErrorCode::MisplacedBreak),
        (&hex!("5f4101420102"), ErrorCode::UnexpectedEof),
        (&hex!("5f6161ff"), ErrorCode::InvalidChunk),
        (&hex!("62c328"), ErrorCode::Utf8Invalid),
        (&hex!("0001"), ErrorCode::TrailingBytes),
    ] {
        let err = from_slice(bytes).unwrap_err();
        assert_eq!(err.code, code, "input {bytes:02x?}");
    }
}

#[test]
fn error_kind_taxonomy_is_observable() {
    let err = from_slice(&hex!("19")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Truncated);
    assert!(err.is_truncated());
    let err = from_slice(&hex!("1c")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);
}

#[test]
fn canonical_encoding_end_to_end() {
    let item = Item::Map(vec![
        (Item::Text("zz".into()), Item::Float(1.5)),
        (Item::Unsigned(100), Item::BytesChunks(vec![vec![1], vec![2]])),
        (Item::Text("a".into()), Item::IndefiniteArray(vec![Item::Unsigned(1)])),
    ]);
    let bytes = to_canonical_vec(&item).unwrap();
    // Keys sort by encoded bytes: 1864 < 6161 < 627a7a; chunked and
    // indefinite forms become definite.
    assert_eq!(bytes, hex!("a3 1864 420102 6161 8101 627a7a f93e00"));
    assert!(is_canonical(&bytes));
    // Decoding yields the sorted, definite-form equivalent.
    assert_eq!(
        from_slice(&bytes).unwrap(),
        Item::Map(vec![
            (Item::Unsigned(100), Item::Bytes(vec![1, 2])),
            (Item::Text("a".into()), Item::Array(vec![Item::Unsigned(1)])),
            (Item::Text("zz".into()), Item::Float(1.5)),
        ])
    );

    let validated = CanonicalCbor::validate(&bytes).unwrap();
    assert_eq!(validated.as_bytes(), bytes);
}

#[test]
fn canonical_validation_rejects_all_wide_forms() {
    for bytes in [
        &hex!("1817")[..],            // overlong int
        &hex!("5f4101ff"),            // indefinite bytes
        &hex!("fb3ff0000000000000"),  // over-wide float
        &hex!("a2 6162 01 6161 02"),  // unsorted keys
        &hex!("f97e01"),              // non-canonical NaN payload
    ] {
        assert!(!is_canonical(bytes), "accepted {bytes:02x?}");
    }
}

#[test]
fn strict_decode_vs_lenient() {
    let overlong = hex!("1b0000000000000001");
    assert_eq!(from_slice(&overlong).unwrap(), Item::Unsigned(1));
    let err = from_slice_with(&overlong, DecodeOptions::canonical()).unwrap_err();
    assert_eq!(err.code, ErrorCode::NonCanonicalEncoding);
}

#[test]
fn registry_datetime_vectors() {
    let reg = Registry::builtin();
    let v = from_slice_native(
        &hex!("c074323031332d30332d32315432303a30343a30305a"),
        &reg,
    )
    .unwrap();
    assert_eq!(v, Value::Timestamp(datetime!(2013-03-21 20:04:00 UTC)));

    let v = from_slice_native(&hex!("c11a514b67b0"), &reg).unwrap();
    assert_eq!(v, Value::Timestamp(datetime!(2013-03-21 20:04:00 UTC)));

    let v = from_slice_native(&hex!("c1fb41d452d9ec200000"), &reg).unwrap();
    assert_eq!(v, Value::Timestamp(datetime!(2013-03-21 20:04:00.5 UTC)));

    // Round trip back out through the native encoder.
    let bytes = to_vec_native(&datetime!(2013-03-21 20:04:00 UTC), &reg).unwrap();
    assert_eq!(bytes, hex!("c074323031332d30332d32315432303a30343a30305a"));
}

#[test]
fn registry_bignum_vectors() {
    let reg = Registry::builtin();
    let v = from_slice_native(&hex!("c249010000000000000000"), &reg).unwrap();
    assert_eq!(v, Value::Int(18_446_744_073_709_551_616));
    let v = from_slice_native(&hex!("c349010000000000000000"), &reg).unwrap();
    assert_eq!(v, Value::Int(-18_446_744_073_709_551_617));

    let bytes = to_vec_native(&(i128::from(u64::MAX) + 1), &reg).unwrap();
    assert_eq!(bytes, hex!("c249010000000000000000"));
}

#[test]
fn item_sequences_and_streams() {
    let items: Vec<_> = iter_slice(&hex!("0102 6161"))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        items,
        vec![Item::Unsigned(1), Item::Unsigned(2), Item::Text("a".into())]
    );
}

#[test]
fn encode_through_writer_decode_through_reader() {
    let mut out: Vec<u8> = Vec::new();
    {
        let mut enc = Encoder::new(WriterSink::new(&mut out));
        enc.array(2, |e| {
            e.text("hi")?;
            e.unsigned(7)
        })
        .unwrap();
        enc.flush().unwrap();
    }
    assert_eq!(out, hex!("82626869 07"));

    let mut src = ReaderSource::new(std::io::Cursor::new(out));
    let mut dec = EventDecoder::new(&mut src);
    let mut evs = Vec::new();
    while let Some(ev) = dec.next_event().unwrap() {
        evs.push(ev);
    }
    assert_eq!(
        evs,
        vec![
            Event::ArrayStart(Some(2)),
            Event::Text("hi".into()),
            Event::Unsigned(7),
            Event::ContainerEnd
        ]
    );
}

#[test]
fn streaming_encoder_matches_tree_encoder() {
    let mut enc = Encoder::new(VecSink::new());
    enc.map(1, |e| {
        e.text("k")?;
        e.indefinite_array(|e| {
            e.bool(true)?;
            e.null()
        })
    })
    .unwrap();
    let streamed = enc.into_sink().into_vec();

    let tree = to_vec(&Item::Map(vec![(
        Item::Text("k".into()),
        Item::IndefiniteArray(vec![Item::TRUE, Item::NULL]),
    )]))
    .unwrap();
    assert_eq!(streamed, tree);
}

#[test]
fn decoder_sharing_a_source_with_trailing_data() {
    let bytes = hex!("8101 deadbeef");
    let mut src = SliceSource::new(&bytes);
    let item = cborstream::Decoder::new(&mut src).decode_item().unwrap();
    assert_eq!(item, Item::Array(vec![Item::Unsigned(1)]));
    // The source is left exactly at the item boundary.
    assert_eq!(src.position(), 2);
}
