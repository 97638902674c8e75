#![cfg(feature = "io-proto")]

use anyhow::Result;
use recordfs::{Error, FileService};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[derive(Clone, PartialEq, prost::Message)]
struct Event {
    #[prost(uint64, tag = "1")]
    id: u64,
    #[prost(string, tag = "2")]
    name: String,
    #[prost(bytes = "vec", tag = "3")]
    payload: Vec<u8>,
}

/// Same wire type, different schema: tag 2 is an int, so `Event` bytes do not fit.
#[derive(Clone, PartialEq, prost::Message)]
struct Narrow {
    #[prost(uint64, tag = "1")]
    id: u64,
    #[prost(uint64, tag = "2")]
    count: u64,
}

fn events(n: u64) -> Vec<Event> {
    (0..n)
        .map(|id| Event {
            id,
            name: format!("event-{id}"),
            payload: vec![id as u8; id as usize],
        })
        .collect()
}

fn write_all(svc: &FileService, path: &Path, data: &[Event]) -> Result<()> {
    let mut w = svc.new_proto_file(path)?;
    for e in data {
        w.write(e)?;
    }
    w.close()?;
    Ok(())
}

fn read_all(svc: &FileService, path: &Path) -> Result<Vec<Event>> {
    let mut r = svc.open_proto_file(path)?;
    let mut out = Vec::new();
    while let Some(e) = r.read::<Event>()? {
        out.push(e);
    }
    Ok(out)
}

#[test]
fn split_and_join_are_bit_exact() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let svc = FileService::new();
    let input = tmp.path().join("events.pb");
    write_all(&svc, &input, &events(11))?;

    let parts = svc.split_proto_file::<Event, _, _>(&input, 4, |i| {
        tmp.path().join(format!("events-{i}.pb"))
    })?;
    assert_eq!(parts.len(), 3);
    let counts: Vec<usize> = parts
        .iter()
        .map(|p| read_all(&svc, p).map(|v| v.len()))
        .collect::<Result<_>>()?;
    assert_eq!(counts, vec![4, 4, 3]);

    let out = tmp.path().join("joined.pb");
    svc.join_proto_files::<Event, _>(&out, &parts)?;
    assert_eq!(fs::read(&out)?, fs::read(&input)?);
    assert_eq!(read_all(&svc, &out)?, events(11));
    Ok(())
}

#[test]
fn gzip_parts_join_into_plain_output() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let svc = FileService::new();
    let input = tmp.path().join("events.pb.gz");
    write_all(&svc, &input, &events(5))?;

    let parts = svc.split_proto_frames(&input, 2, |i| tmp.path().join(format!("p{i}.pb.gz")))?;
    assert_eq!(parts.len(), 3);

    let out = tmp.path().join("joined.pb");
    svc.join_proto_frames(&out, &parts)?;
    assert_eq!(read_all(&svc, &out)?, events(5));
    Ok(())
}

#[test]
fn in_memory_buffer_matches_wire_layout() -> Result<()> {
    let svc = FileService::new();
    let mut w = svc.new_proto_buf(false)?;
    let e = Event {
        id: 1,
        name: "x".into(),
        payload: vec![],
    };
    let body = w.write(&e)?;
    let bytes = w.close()?;
    assert_eq!(bytes[..4], (body.len() as u32).to_be_bytes());
    assert_eq!(&bytes[4..], body.as_slice());

    let mut r = svc.proto_stream(Cursor::new(bytes), false)?;
    assert_eq!(r.read::<Event>()?, Some(e));
    assert_eq!(r.read::<Event>()?, None);
    Ok(())
}

#[test]
fn gzip_buffer_roundtrip() -> Result<()> {
    let svc = FileService::new();
    let mut w = svc.new_proto_buf(true)?;
    for e in events(3) {
        w.write(&e)?;
    }
    let bytes = w.close()?;
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    let mut r = svc.proto_stream(Cursor::new(bytes), true)?;
    let mut holder = Event::default();
    let mut ids = Vec::new();
    while r.read_to(&mut holder)? {
        ids.push(holder.id);
    }
    assert_eq!(ids, vec![0, 1, 2]);
    Ok(())
}

#[test]
fn truncated_part_fails_join_with_framing_error() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let svc = FileService::new();
    let good = tmp.path().join("good.pb");
    write_all(&svc, &good, &events(3))?;
    let mut bytes = fs::read(&good)?;
    bytes.truncate(bytes.len() - 2);
    let cut = tmp.path().join("cut.pb");
    fs::write(&cut, bytes)?;

    let err = svc
        .join_proto_frames(tmp.path().join("out.pb"), &[&good, &cut])
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Framing(_))));
    Ok(())
}

#[test]
fn typed_split_rejects_foreign_messages() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let svc = FileService::new();
    let input = tmp.path().join("events.pb");
    write_all(&svc, &input, &events(3))?;

    let err = svc
        .split_proto_file::<Narrow, _, _>(&input, 10, |i| tmp.path().join(format!("n{i}.pb")))
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Decode(_))));
    Ok(())
}

#[test]
fn empty_file_yields_no_parts() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let svc = FileService::new();
    let input = tmp.path().join("empty.pb");
    fs::write(&input, b"")?;
    let parts: Vec<PathBuf> =
        svc.split_proto_frames(&input, 3, |i| tmp.path().join(format!("e{i}.pb")))?;
    assert!(parts.is_empty());
    Ok(())
}
