//! The writer (spec §4.9): serialize an `XRefTable` back to PDF bytes,
//! either as a classical xref section or as an xref stream + object
//! streams, re-encrypting as needed.

use std::collections::{HashMap, HashSet};

use pdf_filters::params::PredictorParams;
use pdf_object::{Dict, Object, Stream, StreamData};
use tracing::warn;

use crate::config::Config;
use crate::error::PdfError;
use crate::stats::WriteStats;
use crate::xref::{Entry, EntryKind, XRefTable};

const OBJECT_STREAM_MAX_OBJECTS: usize = 100;

enum Location {
    Offset(u64),
    Compressed { container: u32, index: u32 },
}

/// Serialize `xref` to a full (non-incremental) PDF file. The xref
/// section itself is never encrypted even when the document is (spec
/// §4.3 "Scope"); object/stream bodies are re-encrypted under the
/// document's current security handler, if any.
pub fn write(xref: &XRefTable, header_version: u8, config: &Config) -> Result<(Vec<u8>, WriteStats), PdfError> {
    let config = config.clone().normalized();
    let mut work = clone_table(xref);
    let mut stats = WriteStats::default();
    let eol = config.eol.as_bytes();

    let mut out = Vec::new();
    out.extend_from_slice(format!("%PDF-1.{}", header_version).as_bytes());
    out.extend_from_slice(eol);
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3");
    out.extend_from_slice(eol);

    let mut locations: HashMap<u32, Location> = HashMap::new();

    if config.write_object_stream {
        assign_object_streams(&mut work, &mut locations);
    }

    let live_numbers: Vec<u32> = (1..work.size())
        .filter(|&n| work.find(n).map(|e| e.kind == EntryKind::InUse).unwrap_or(false))
        .filter(|n| !locations.contains_key(n))
        .collect();

    for &number in &live_numbers {
        write_direct_object(&work, number, &mut out, &mut locations, &mut stats, eol)?;
    }

    for container_number in container_numbers(&locations) {
        write_object_stream_container(&work, container_number, &mut out, &mut locations, &mut stats, eol)?;
    }

    stats.object_count = locations.len() as u64;

    let xref_offset = out.len() as u64;
    if config.write_xref_stream {
        write_xref_stream_section(&work, &locations, xref_offset, &mut out)?;
    } else {
        write_classical_xref_section(&work, &locations, xref_offset, &mut out, eol);
    }

    Ok((out, stats))
}

fn clone_table(xref: &XRefTable) -> XRefTable {
    let mut copy = XRefTable::new();
    copy.trailer = xref.trailer.clone();
    copy.crypt = xref.crypt.clone();
    copy.ensure_size(xref.size().saturating_sub(1));
    for number in 0..xref.size() {
        if let Some(entry) = xref.find(number) {
            copy.set_entry(number, entry.clone());
        }
    }
    copy
}

fn container_numbers(locations: &HashMap<u32, Location>) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for loc in locations.values() {
        if let Location::Compressed { container, .. } = loc {
            if seen.insert(*container) {
                out.push(*container);
            }
        }
    }
    out.sort_unstable();
    out
}

/// Group eligible (non-stream, non-Encrypt) in-use objects into fresh
/// `ObjStm` container entries of up to `OBJECT_STREAM_MAX_OBJECTS`
/// members each (spec §4.9), recording each member's container and index.
fn assign_object_streams(xref: &mut XRefTable, locations: &mut HashMap<u32, Location>) {
    let encrypt_number = xref.trailer.get(b"Encrypt").and_then(|o| o.as_reference()).map(|id| id.number);

    let candidates: Vec<u32> = (1..xref.size())
        .filter(|&n| xref.find(n).map(|e| e.kind == EntryKind::InUse).unwrap_or(false))
        .filter(|&n| Some(n) != encrypt_number)
        .filter(|&n| !matches!(xref.find(n).and_then(|e| e.object.as_ref()), Some(Object::Stream(_))))
        .collect();

    for chunk in candidates.chunks(OBJECT_STREAM_MAX_OBJECTS) {
        let container_dict = Dict::new();
        let container_id = xref.insert_new(Object::Stream(Stream::new_raw(container_dict, Vec::new())));
        for (index, &number) in chunk.iter().enumerate() {
            locations.insert(
                number,
                Location::Compressed {
                    container: container_id.number,
                    index: index as u32,
                },
            );
        }
    }
}

fn write_direct_object(
    xref: &XRefTable,
    number: u32,
    out: &mut Vec<u8>,
    locations: &mut HashMap<u32, Location>,
    stats: &mut WriteStats,
    eol: &[u8],
) -> Result<(), PdfError> {
    if locations.contains_key(&number) {
        warn!(number, "object already written, skipping duplicate write");
        return Ok(());
    }
    let entry = xref.find(number).expect("checked InUse above");
    let offset = out.len() as u64;
    locations.insert(number, Location::Offset(offset));

    out.extend_from_slice(format!("{} {} obj", number, entry.generation).as_bytes());
    out.extend_from_slice(eol);

    let object = entry.object.clone().unwrap_or(Object::Null);
    let object = reencrypt_object(xref, number, entry.generation, object)?;
    if let Object::Stream(stream) = &object {
        stats.total_binary_size += stream.raw_len() as u64;
    }
    out.extend_from_slice(&object.to_pdf_bytes());
    out.extend_from_slice(eol);
    out.extend_from_slice(b"endobj");
    out.extend_from_slice(eol);
    Ok(())
}

/// Apply the security handler (if any) to an object's strings and, if it's
/// a stream, its raw payload, before serialization.
fn reencrypt_object(xref: &XRefTable, n: u32, g: u16, mut object: Object) -> Result<Object, PdfError> {
    let Some(handler) = &xref.crypt else {
        return Ok(object);
    };
    reencrypt_strings(&mut object, handler, n, g);
    if let Object::Stream(stream) = &mut object {
        if !stream.dict.is_xref_stream() {
            let raw = stream.data.bytes();
            let cipher = handler.encrypt(n, g, raw);
            stream.data = StreamData::Raw(cipher);
        }
    }
    Ok(object)
}

fn reencrypt_strings(obj: &mut Object, handler: &pdf_crypto::SecurityHandler, n: u32, g: u16) {
    match obj {
        Object::StringLiteral(bytes) | Object::HexLiteral(bytes) => {
            *bytes = handler.encrypt(n, g, bytes);
        }
        Object::Array(items) => items.iter_mut().for_each(|o| reencrypt_strings(o, handler, n, g)),
        Object::Dict(dict) => dict.iter_mut().for_each(|(_, v)| reencrypt_strings(v, handler, n, g)),
        Object::Stream(stream) => stream.dict.iter_mut().for_each(|(_, v)| reencrypt_strings(v, handler, n, g)),
        _ => {}
    }
}

fn write_object_stream_container(
    xref: &XRefTable,
    container_number: u32,
    out: &mut Vec<u8>,
    locations: &mut HashMap<u32, Location>,
    stats: &mut WriteStats,
    eol: &[u8],
) -> Result<(), PdfError> {
    let mut members: Vec<(u32, u32)> = locations
        .iter()
        .filter_map(|(&number, loc)| match loc {
            Location::Compressed { container, index } if *container == container_number => {
                Some((*index, number))
            }
            _ => None,
        })
        .collect();
    members.sort_unstable();

    let mut prolog = Vec::new();
    let mut body = Vec::new();
    for (_, number) in &members {
        let entry = xref.find(*number).expect("compressed candidate was InUse");
        let object = entry.object.clone().unwrap_or(Object::Null);
        prolog.extend_from_slice(format!("{} {} ", number, body.len()).as_bytes());
        body.extend_from_slice(&object.to_pdf_bytes());
        body.push(b' ');
        stats.compressed_object_count += 1;
    }

    let first = prolog.len() as i64;
    let mut payload = prolog;
    payload.extend_from_slice(&body);
    let compressed = pdf_filters::flate::encode(&payload, &PredictorParams::default())?;

    let mut dict = Dict::new();
    dict.set(b"Type".to_vec(), Object::Name(b"ObjStm".to_vec()));
    dict.set(b"N".to_vec(), Object::Integer(members.len() as i64));
    dict.set(b"First".to_vec(), Object::Integer(first));
    dict.set(b"Filter".to_vec(), Object::Name(b"FlateDecode".to_vec()));
    dict.set(b"Length".to_vec(), Object::Integer(compressed.len() as i64));

    let offset = out.len() as u64;
    locations.insert(container_number, Location::Offset(offset));

    out.extend_from_slice(format!("{} 0 obj", container_number).as_bytes());
    out.extend_from_slice(eol);
    let container = Object::Stream(Stream::new_raw(dict, compressed));
    stats.total_binary_size += container.as_stream().map(|s| s.raw_len() as u64).unwrap_or(0);
    out.extend_from_slice(&container.to_pdf_bytes());
    out.extend_from_slice(eol);
    out.extend_from_slice(b"endobj");
    out.extend_from_slice(eol);
    Ok(())
}

fn write_classical_xref_section(
    xref: &XRefTable,
    locations: &HashMap<u32, Location>,
    xref_offset: u64,
    out: &mut Vec<u8>,
    eol: &[u8],
) {
    out.extend_from_slice(b"xref");
    out.extend_from_slice(eol);
    out.extend_from_slice(format!("0 {}", xref.size()).as_bytes());
    out.extend_from_slice(eol);
    for number in 0..xref.size() {
        let entry = xref.find(number).expect("within size");
        let (offset, generation) = match (entry.kind, locations.get(&number)) {
            (EntryKind::InUse, Some(Location::Offset(o))) => (*o, entry.generation),
            (EntryKind::Free, _) => (entry.offset, entry.generation),
            _ => (0, entry.generation),
        };
        let flag = if entry.kind == EntryKind::Free { 'f' } else { 'n' };
        out.extend_from_slice(format!("{:010} {:05} {} ", offset, generation, flag).as_bytes());
        out.extend_from_slice(eol);
    }

    out.extend_from_slice(b"trailer");
    out.extend_from_slice(eol);
    let mut trailer = xref.trailer.clone();
    trailer.set(b"Size".to_vec(), Object::Integer(xref.size() as i64));
    out.extend_from_slice(&Object::Dict(trailer).to_pdf_bytes());
    out.extend_from_slice(eol);
    out.extend_from_slice(b"startxref");
    out.extend_from_slice(eol);
    out.extend_from_slice(xref_offset.to_string().as_bytes());
    out.extend_from_slice(eol);
    out.extend_from_slice(b"%%EOF");
}

/// Pack one xref-stream row per object: `W = [1, 8, 2]` (type byte, 8-byte
/// offset/container-number, 2-byte generation/index) (spec §4.9).
fn write_xref_stream_section(
    xref: &XRefTable,
    locations: &HashMap<u32, Location>,
    xref_offset: u64,
    out: &mut Vec<u8>,
) -> Result<(), PdfError> {
    let self_number = xref.size();
    let mut payload = Vec::with_capacity((self_number as usize + 1) * 11);
    for number in 0..xref.size() {
        let entry = xref.find(number).expect("within size");
        match (entry.kind, locations.get(&number)) {
            (EntryKind::Free, _) => {
                payload.push(0);
                payload.extend_from_slice(&(entry.offset as u64).to_be_bytes());
                payload.extend_from_slice(&entry.generation.to_be_bytes());
            }
            (EntryKind::InUse, Some(Location::Offset(o))) => {
                payload.push(1);
                payload.extend_from_slice(&o.to_be_bytes());
                payload.extend_from_slice(&entry.generation.to_be_bytes());
            }
            (_, Some(Location::Compressed { container, index })) => {
                payload.push(2);
                payload.extend_from_slice(&(*container as u64).to_be_bytes());
                payload.extend_from_slice(&(*index as u16).to_be_bytes());
            }
            _ => {
                payload.push(0);
                payload.extend_from_slice(&0u64.to_be_bytes());
                payload.extend_from_slice(&0u16.to_be_bytes());
            }
        }
    }
    // The xref stream's own entry, one past the current table (spec §4.9).
    payload.push(1);
    payload.extend_from_slice(&xref_offset.to_be_bytes());
    payload.extend_from_slice(&0u16.to_be_bytes());

    let compressed = pdf_filters::flate::encode(&payload, &PredictorParams::default())?;

    let mut dict = xref.trailer.clone();
    dict.set(b"Type".to_vec(), Object::Name(b"XRef".to_vec()));
    dict.set(b"Size".to_vec(), Object::Integer(self_number as i64 + 1));
    dict.set(
        b"W".to_vec(),
        Object::Array(vec![Object::Integer(1), Object::Integer(8), Object::Integer(2)]),
    );
    dict.set(b"Filter".to_vec(), Object::Name(b"FlateDecode".to_vec()));
    dict.set(b"Length".to_vec(), Object::Integer(compressed.len() as i64));

    let stream = Object::Stream(Stream::new_raw(dict, compressed));
    out.extend_from_slice(format!("{} 0 obj\n", self_number).as_bytes());
    out.extend_from_slice(&stream.to_pdf_bytes());
    out.extend_from_slice(b"\nendobj\nstartxref\n");
    out.extend_from_slice(format!("{}\n%%EOF", xref_offset).as_bytes());
    Ok(())
}

/// Selective write support (spec §4.9 "Selective write"): emit only the
/// closure reachable from `reachable`, dropping everything else so the
/// result is a self-consistent standalone document.
pub fn write_selection(
    xref: &XRefTable,
    header_version: u8,
    config: &Config,
    reachable: &HashSet<u32>,
) -> Result<(Vec<u8>, WriteStats), PdfError> {
    let mut pruned = XRefTable::new();
    pruned.trailer = xref.trailer.clone();
    pruned.crypt = xref.crypt.clone();
    pruned.ensure_size(xref.size().saturating_sub(1));

    for &number in reachable {
        if let Some(entry) = xref.find(number) {
            if entry.kind == EntryKind::InUse {
                pruned.set_entry(
                    number,
                    Entry::in_use(0, entry.generation, entry.object.clone().unwrap_or(Object::Null)),
                );
            }
        }
    }

    write(&pruned, header_version, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_object::ObjectId;
    use pretty_assertions::assert_eq;

    fn small_table() -> XRefTable {
        let mut xref = XRefTable::new();
        let catalog_id = xref.ind_ref_for_new_object();
        let pages_id = ObjectId::new(catalog_id.number + 1, 0);
        let mut catalog = Dict::new();
        catalog.set(b"Type".to_vec(), Object::Name(b"Catalog".to_vec()));
        catalog.set(b"Pages".to_vec(), Object::Reference(pages_id));
        xref.insert_new(Object::Dict(catalog));

        let mut pages = Dict::new();
        pages.set(b"Type".to_vec(), Object::Name(b"Pages".to_vec()));
        pages.set(b"Kids".to_vec(), Object::Array(vec![]));
        pages.set(b"Count".to_vec(), Object::Integer(0));
        xref.insert_new(Object::Dict(pages));

        xref.trailer.set(b"Root".to_vec(), Object::Reference(catalog_id));
        xref
    }

    #[test]
    fn classical_write_round_trips_through_the_reader() {
        let xref = small_table();
        let config = Config::default();
        let (bytes, stats) = write(&xref, 7, &config).unwrap();
        assert_eq!(stats.object_count, 2);

        let result = crate::reader::read(&bytes, &config).unwrap();
        let catalog = result
            .xref
            .dereference_dict(&Object::Reference(ObjectId::new(1, 0)))
            .unwrap();
        assert_eq!(catalog.type_name(), Some(b"Catalog".as_slice()));
    }

    #[test]
    fn compressed_write_produces_an_xref_stream_and_round_trips() {
        let xref = small_table();
        let config = Config {
            write_object_stream: true,
            ..Config::default()
        };
        let (bytes, stats) = write(&xref, 7, &config).unwrap();
        assert!(stats.compressed_object_count > 0);

        let result = crate::reader::read(&bytes, &config).unwrap();
        let catalog = result
            .xref
            .dereference_dict(&Object::Reference(ObjectId::new(1, 0)))
            .unwrap();
        assert_eq!(catalog.type_name(), Some(b"Catalog".as_slice()));
    }
}
