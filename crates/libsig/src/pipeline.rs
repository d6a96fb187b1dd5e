//! End-to-end extraction pipeline.
//!
//! The submitter thread walks the archive and fans accepted objects out to
//! the worker pool; each worker derives its object's function spans and
//! generates their signatures; the submitter then merges the per-object maps
//! in submission order and writes the final document. Merging in submission
//! order makes the "last writer wins" rule for duplicate names deterministic
//! for a given input.

use crate::logger::Logger;
use crate::pool::WorkerPool;
use anyhow::{Context, Result};
use libsig_formats::{coff, ArchiveReader, CoffObject, Machine};
use libsig_patterns::function_pattern;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Name of the emitted document inside the output directory.
pub const OUTPUT_FILE_NAME: &str = "Signatures.json";

/// Outcome of one run.
pub struct Summary {
    /// Functions that went through the signature generator.
    pub functions: u32,
    /// Where the document was written.
    pub output_path: PathBuf,
}

/// Runs the whole pipeline: read, walk, analyze in parallel, merge, write.
///
/// Fatal conditions (unreadable input, not an archive) return `Err`. A
/// malformed or truncated member ends the walk early but still produces a
/// document from the members before it.
pub fn run(archive_path: &Path, output_dir: &Path, logger: &Logger) -> Result<Summary> {
    logger.line(format!("parsing {}", archive_path.display()));

    let data = fs::read(archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    logger.line(format!("read {} bytes", data.len()));

    let data = Arc::new(data);
    let reader = ArchiveReader::new(&data[..])
        .with_context(|| format!("{} is not a static library", archive_path.display()))?;
    logger.line("archive container recognized");

    let pool = WorkerPool::new();
    let functions_processed = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();

    for member in reader.members() {
        let member = match member {
            Ok(member) => member,
            Err(e) => {
                logger.line(format!("stopping member walk: {e}"));
                break;
            }
        };
        if member.is_reserved() {
            continue;
        }
        let Some(machine) = coff::probe(&data[member.data.clone()]) else {
            continue;
        };
        logger.line(format!(
            "queued {} ({} bytes)",
            member.display_name(),
            member.size()
        ));

        let data = Arc::clone(&data);
        let range = member.data.clone();
        let counter = Arc::clone(&functions_processed);
        let worker_logger = logger.clone();
        let handle = pool.submit(move || {
            analyze_object(&data[range], machine, &counter, &worker_logger)
        })?;
        handles.push(handle);
    }

    // Per-object maps merge in submission order; a later object overwrites
    // an earlier one on the same name.
    let mut signatures = serde_json::Map::new();
    for handle in handles {
        for (name, pattern) in handle.wait()? {
            signatures.insert(name, Value::String(pattern));
        }
    }

    let output_path = output_dir.join(OUTPUT_FILE_NAME);
    write_document(&output_path, &signatures)?;

    let functions = functions_processed.load(Ordering::Relaxed);
    logger.line(format!("processed {functions} functions"));
    logger.line(format!("signatures saved to {}", output_path.display()));

    Ok(Summary {
        functions,
        output_path,
    })
}

/// Derives every code function in one object and generates its signature.
/// Runs on a worker thread; the returned map is owned by the worker until
/// the submitter collects it.
fn analyze_object(
    object: &[u8],
    machine: Machine,
    functions_processed: &AtomicU32,
    logger: &Logger,
) -> HashMap<String, String> {
    let mut signatures = HashMap::new();
    let Ok(object) = CoffObject::parse(object) else {
        return signatures;
    };
    for function in object.code_functions() {
        logger.line(format!(
            "generating signature for {} ({} bytes)",
            function.name,
            function.bytes.len()
        ));
        let pattern = function_pattern(function.bytes, machine.is_x64());
        functions_processed.fetch_add(1, Ordering::Relaxed);
        logger.line(format!("{} -> {}", function.name, pattern));
        signatures.insert(function.name, pattern.to_string());
    }
    signatures
}

/// Writes the document pretty-printed with 4-space indentation and a
/// trailing newline, creating or truncating the file.
fn write_document(path: &Path, signatures: &serde_json::Map<String, Value>) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    signatures
        .serialize(&mut serializer)
        .context("failed to serialize signature document")?;
    buf.push(b'\n');
    fs::write(path, buf).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
