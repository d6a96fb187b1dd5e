//! End-to-end pipeline tests over synthetic archives.
//!
//! The archives are assembled byte-by-byte here, one member per object, so
//! every on-disk structure the walker and analyzer consume is exercised
//! without fixtures on disk.

use libsig::logger::{Logger, MemorySink};
use libsig::pipeline;
use std::fs;
use std::sync::Arc;

const MACHINE_AMD64: u16 = 0x8664;
const MACHINE_ARM: u16 = 0x01c0;
const SCN_CNT_CODE: u32 = 0x0000_0020;

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// A one-section object defining `symbols` as external function symbols over
/// `code`.
fn object(machine: u16, code: &[u8], symbols: &[(&str, u32)]) -> Vec<u8> {
    let code_offset = 20 + 40;
    let symtab_offset = code_offset + code.len();

    let mut data = Vec::new();
    push_u16(&mut data, machine);
    push_u16(&mut data, 1); // sections
    push_u32(&mut data, 0); // timestamp
    push_u32(&mut data, symtab_offset as u32);
    push_u32(&mut data, symbols.len() as u32);
    push_u16(&mut data, 0); // optional header size
    push_u16(&mut data, 0); // characteristics

    data.extend_from_slice(b".text\0\0\0");
    push_u32(&mut data, code.len() as u32); // virtual size
    push_u32(&mut data, 0); // virtual address
    push_u32(&mut data, code.len() as u32); // size of raw data
    push_u32(&mut data, code_offset as u32); // pointer to raw data
    data.extend_from_slice(&[0u8; 12]); // reloc/linenum pointers and counts
    push_u32(&mut data, SCN_CNT_CODE);

    data.extend_from_slice(code);
    for (name, value) in symbols {
        let mut short = [0u8; 8];
        short[..name.len()].copy_from_slice(name.as_bytes());
        data.extend_from_slice(&short);
        push_u32(&mut data, *value);
        push_u16(&mut data, 1); // section number
        push_u16(&mut data, 0x20); // function type
        data.push(2); // external storage class
        data.push(0); // no aux records
    }
    push_u32(&mut data, 4); // empty string table: just its length field
    data
}

fn member(name: &[u8], payload: &[u8]) -> Vec<u8> {
    member_with_size_field(name, payload, payload.len().to_string().as_bytes())
}

fn member_with_size_field(name: &[u8], payload: &[u8], size_field: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut name_field = [b' '; 16];
    name_field[..name.len()].copy_from_slice(name);
    out.extend_from_slice(&name_field);
    out.extend_from_slice(&[b' '; 32]); // date, uid, gid, mode
    let mut size = [b' '; 10];
    size[..size_field.len()].copy_from_slice(size_field);
    out.extend_from_slice(&size);
    out.extend_from_slice(b"`\n");
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(b'\n');
    }
    out
}

fn archive(members: &[Vec<u8>]) -> Vec<u8> {
    let mut data = b"!<arch>\n".to_vec();
    for m in members {
        data.extend_from_slice(m);
    }
    data
}

/// Writes `data` as a library in a fresh temp dir and runs the pipeline over
/// it, returning the emitted document text and the captured log lines.
fn run_pipeline(data: &[u8]) -> (String, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.lib");
    fs::write(&input, data).unwrap();

    let sink = Arc::new(MemorySink::new());
    let logger = Logger::new(sink.clone());
    let summary = pipeline::run(&input, dir.path(), &logger).unwrap();

    assert_eq!(summary.output_path, dir.path().join("Signatures.json"));
    let document = fs::read_to_string(&summary.output_path).unwrap();
    (document, sink.lines())
}

#[test]
fn test_empty_archive_produces_empty_document() {
    let (document, _) = run_pipeline(&archive(&[]));
    assert_eq!(document, "{}\n");
}

#[test]
fn test_metadata_only_archive_produces_empty_document() {
    let data = archive(&[member(b"/", b"symbol index"), member(b"//", b"long names")]);
    let (document, _) = run_pipeline(&data);
    assert_eq!(document, "{}\n");
}

#[test]
fn test_single_function_of_nops() {
    let obj = object(MACHINE_AMD64, &[0x90, 0x90, 0x90], &[("abc", 0)]);
    let (document, lines) = run_pipeline(&archive(&[member(b"a.obj", &obj)]));
    assert_eq!(document, "{\n    \"abc\": \"90 90 90\"\n}\n");
    assert!(lines.iter().any(|l| l == "processed 1 functions"));
}

#[test]
fn test_relative_call_is_wildcarded() {
    let code = [0xE8, 0x00, 0x00, 0x00, 0x00];
    let obj = object(MACHINE_AMD64, &code, &[("caller", 0)]);
    let (document, _) = run_pipeline(&archive(&[member(b"a.obj", &obj)]));

    let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(parsed["caller"], "E8 ?? ?? ?? ??");
}

#[test]
fn test_unsupported_machine_is_skipped() {
    let obj = object(MACHINE_ARM, &[0x90], &[("armfn", 0)]);
    let (document, _) = run_pipeline(&archive(&[member(b"arm.obj", &obj)]));
    assert_eq!(document, "{}\n");
}

#[test]
fn test_last_submitted_object_wins_duplicate_names() {
    let first = object(MACHINE_AMD64, &[0x90, 0x90, 0x90], &[("dup", 0)]);
    let second = object(MACHINE_AMD64, &[0xC3], &[("dup", 0)]);
    let data = archive(&[member(b"1.obj", &first), member(b"2.obj", &second)]);
    let (document, _) = run_pipeline(&data);

    let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(parsed["dup"], "C3");
}

#[test]
fn test_multiple_objects_merge() {
    let first = object(MACHINE_AMD64, &[0x90, 0xC3], &[("one", 0)]);
    let second = object(MACHINE_AMD64, &[0xC3], &[("two", 0)]);
    let data = archive(&[member(b"1.obj", &first), member(b"2.obj", &second)]);
    let (document, lines) = run_pipeline(&data);

    let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(parsed["one"], "90 C3");
    assert_eq!(parsed["two"], "C3");
    assert!(lines.iter().any(|l| l == "processed 2 functions"));
}

#[test]
fn test_two_functions_split_by_symbol_values() {
    let code = [0x90, 0x90, 0xC3, 0x55, 0xC3];
    let obj = object(MACHINE_AMD64, &code, &[("first", 0), ("second", 3)]);
    let (document, _) = run_pipeline(&archive(&[member(b"a.obj", &obj)]));

    let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(parsed["first"], "90 90 C3");
    assert_eq!(parsed["second"], "55 C3");
}

#[test]
fn test_malformed_trailing_member_keeps_prior_results() {
    let obj = object(MACHINE_AMD64, &[0x90, 0x90, 0x90], &[("kept", 0)]);
    let data = archive(&[
        member(b"good.obj", &obj),
        member_with_size_field(b"bad", b"", b"12xyz"),
    ]);
    let (document, lines) = run_pipeline(&data);

    let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(parsed["kept"], "90 90 90");
    assert!(lines.iter().any(|l| l.starts_with("stopping member walk")));
}

#[test]
fn test_odd_sized_member_padding_does_not_derail_walk() {
    // 3 code bytes makes the whole object an odd number of bytes.
    let odd = object(MACHINE_AMD64, &[0x90, 0x90, 0x90], &[("odd", 0)]);
    assert_eq!(odd.len() % 2, 1);
    let even = object(MACHINE_AMD64, &[0xC3], &[("even", 0)]);
    let data = archive(&[member(b"odd.obj", &odd), member(b"even.obj", &even)]);
    let (document, _) = run_pipeline(&data);

    let parsed: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(parsed["odd"], "90 90 90");
    assert_eq!(parsed["even"], "C3");
}

#[test]
fn test_runs_are_byte_identical() {
    let first = object(MACHINE_AMD64, &[0x90, 0xC3], &[("a", 0), ("b", 1)]);
    let second = object(MACHINE_AMD64, &[0xE9, 0, 0, 0, 0], &[("c", 0)]);
    let data = archive(&[member(b"1.obj", &first), member(b"2.obj", &second)]);

    let (run_one, _) = run_pipeline(&data);
    let (run_two, _) = run_pipeline(&data);
    assert_eq!(run_one, run_two);
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let logger = Logger::new(sink);
    let missing = dir.path().join("does-not-exist.lib");
    assert!(pipeline::run(&missing, dir.path(), &logger).is_err());
}

#[test]
fn test_non_archive_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("not-a-lib.bin");
    fs::write(&input, b"MZ\x90\x00 definitely not an archive").unwrap();
    let sink = Arc::new(MemorySink::new());
    let logger = Logger::new(sink);
    assert!(pipeline::run(&input, dir.path(), &logger).is_err());
    assert!(!dir.path().join("Signatures.json").exists());
}

#[test]
fn test_existing_document_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.lib");
    fs::write(&input, archive(&[])).unwrap();
    let out = dir.path().join("Signatures.json");
    fs::write(&out, "stale content that is longer than the new document").unwrap();

    let logger = Logger::new(Arc::new(MemorySink::new()));
    pipeline::run(&input, dir.path(), &logger).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), "{}\n");
}
