//! Reader orchestration (spec §4.6): drive the parser, authenticate
//! encryption, materialize object streams, and report statistics.

use std::time::Instant;

use pdf_crypto::{AccessLevel, EncryptDictFields, SecurityHandler};
use pdf_object::{Object, ObjectId};
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::PdfError;
use crate::parser;
use crate::stats::ReadStats;
use crate::xref::{EntryKind, XRefTable};

pub struct ReadResult {
    pub xref: XRefTable,
    pub header_version: u8,
    pub access_level: Option<AccessLevel>,
    pub stats: ReadStats,
}

#[instrument(skip(data, config), fields(len = data.len()))]
pub fn read(data: &[u8], config: &Config) -> Result<ReadResult, PdfError> {
    let mut stats = ReadStats::default();

    let t0 = Instant::now();
    let (header_version, _header_pos) = parser::parse_header_version(data)
        .ok_or_else(|| PdfError::CorruptXref("no %PDF- header found".into()))?;
    stats.timings.header_parse = t0.elapsed();

    let t1 = Instant::now();
    let mut xref = parser::recover_xref(data)?;
    stats.timings.xref_build = t1.elapsed();

    let t2 = Instant::now();
    let access_level = authenticate_and_decrypt(&mut xref, config)?;
    stats.timings.decrypt = t2.elapsed();

    let t3 = Instant::now();
    if config.reader_15.0 {
        materialize_object_streams(&mut xref)?;
    }
    stats.timings.object_stream_materialize = t3.elapsed();

    collect_stats(&xref, &mut stats);

    Ok(ReadResult {
        xref,
        header_version,
        access_level,
        stats,
    })
}

#[instrument(skip(xref, config))]
fn authenticate_and_decrypt(
    xref: &mut XRefTable,
    config: &Config,
) -> Result<Option<AccessLevel>, PdfError> {
    let Some(encrypt_ref) = xref.trailer.get(b"Encrypt").cloned() else {
        return Ok(None);
    };
    let Object::Reference(encrypt_id) = encrypt_ref else {
        return Ok(None);
    };
    let Some(encrypt_dict) = xref.dereference_dict(&Object::Reference(encrypt_id)) else {
        return Err(PdfError::AuthenticationRequired);
    };

    let id0 = xref
        .trailer
        .array_entry(b"ID")
        .and_then(|a| a.first())
        .and_then(|o| xref.dereference_string(o))
        .ok_or(PdfError::AuthenticationRequired)?;

    let v = encrypt_dict.int_entry(b"V").unwrap_or(1) as u8;
    let r = encrypt_dict.int_entry(b"R").unwrap_or(2) as u8;
    let p = encrypt_dict.int_entry(b"P").unwrap_or(-4) as i32;
    let key_len_bits = encrypt_dict.int_entry(b"Length").unwrap_or(40);
    let encrypt_metadata = encrypt_dict.boolean_entry(b"EncryptMetadata").unwrap_or(true);
    let use_aes = crypt_filter_is_aes(&encrypt_dict, v);

    let o = encrypt_dict.string_entry_bytes(b"O").unwrap_or(&[]).to_vec();
    let u = encrypt_dict.string_entry_bytes(b"U").unwrap_or(&[]).to_vec();
    let oe = encrypt_dict.string_entry_bytes(b"OE").unwrap_or(&[]).to_vec();
    let ue = encrypt_dict.string_entry_bytes(b"UE").unwrap_or(&[]).to_vec();

    let fields = EncryptDictFields {
        v,
        r,
        o,
        u,
        oe,
        ue,
        p,
        id0,
        key_len_bytes: (key_len_bits / 8).max(5) as usize,
        use_aes,
        encrypt_metadata,
    };

    let user_pw = config.user_pw.as_deref().unwrap_or("").as_bytes();
    let owner_pw = config.owner_pw.as_deref().unwrap_or("").as_bytes();
    let handler = SecurityHandler::authenticate(&fields, user_pw, owner_pw)?;
    let access = handler.access;
    xref.crypt = Some(handler);

    decrypt_strings_in_place(xref, encrypt_id.number);

    Ok(Some(access))
}

fn crypt_filter_is_aes(encrypt_dict: &pdf_object::Dict, v: u8) -> bool {
    if v < 4 {
        return false;
    }
    let Some(cf) = encrypt_dict.dict_entry(b"CF") else {
        return false;
    };
    let stmf = encrypt_dict.name_entry(b"StmF").unwrap_or(b"Identity");
    let Some(filter_dict) = cf.dict_entry(stmf) else {
        return false;
    };
    matches!(filter_dict.name_entry(b"CFM"), Some(b"AESV2") | Some(b"AESV3"))
}

/// Decrypt every `StringLiteral`/`HexLiteral` reachable from each in-use
/// object's own value, keyed by that object's `(n, g)` (spec §4.3
/// "Scope"). Streams are decrypted lazily at dereference time instead
/// (`XRefTable::dereference_stream`); the Encrypt dict's own strings
/// (`U`/`O`/raw hash bytes, not PDF ciphertext) are never touched.
fn decrypt_strings_in_place(xref: &mut XRefTable, encrypt_dict_number: u32) {
    let handler = xref.crypt.clone();
    let Some(handler) = handler else { return };

    for number in 0..xref.size() {
        if number == encrypt_dict_number {
            continue;
        }
        let Some(entry) = xref.find_mut(number) else { continue };
        if entry.kind != EntryKind::InUse {
            continue;
        }
        let generation = entry.generation;
        if let Some(obj) = entry.object.as_mut() {
            decrypt_strings_recursive(obj, &handler, number, generation);
        }
    }
}

fn decrypt_strings_recursive(obj: &mut Object, handler: &SecurityHandler, n: u32, g: u16) {
    match obj {
        Object::StringLiteral(bytes) | Object::HexLiteral(bytes) => {
            if let Ok(plain) = handler.decrypt(n, g, bytes) {
                *bytes = plain;
            }
        }
        Object::Array(items) => {
            for item in items {
                decrypt_strings_recursive(item, handler, n, g);
            }
        }
        Object::Dict(dict) => {
            for (_, v) in dict.iter_mut() {
                decrypt_strings_recursive(v, handler, n, g);
            }
        }
        Object::Stream(stream) => {
            for (_, v) in stream.dict.iter_mut() {
                decrypt_strings_recursive(v, handler, n, g);
            }
        }
        _ => {}
    }
}

/// Decode every `ObjStm` container referenced by a `Compressed` entry and
/// parse its members in place (spec §4.5 step 4, §4.6 step 5). Runs after
/// decryption is wired up, since containers may themselves be encrypted.
#[instrument(skip(xref))]
fn materialize_object_streams(xref: &mut XRefTable) -> Result<(), PdfError> {
    let mut containers = std::collections::HashSet::new();
    for number in 0..xref.size() {
        if let Some(entry) = xref.find(number) {
            if entry.kind == EntryKind::Compressed {
                if let Some(stream_num) = entry.object_stream {
                    containers.insert(stream_num);
                }
            }
        }
    }

    for stream_num in containers {
        let container_id = ObjectId::new(stream_num, 0);
        let decoded = match xref.dereference_stream(container_id) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(stream_num, %e, "failed to materialize object stream; leaving members null");
                continue;
            }
        };
        let Some(container_dict) = xref.dereference_dict(&Object::Reference(container_id)) else {
            continue;
        };
        let n = container_dict.int_entry(b"N").unwrap_or(0).max(0) as u32;
        let first = container_dict.int_entry(b"First").unwrap_or(0).max(0) as usize;

        for (obj_num, value) in parser::parse_object_stream_members(&decoded, n, first) {
            if let Some(entry) = xref.find_mut(obj_num) {
                if entry.kind == EntryKind::Compressed {
                    entry.object = Some(value);
                    debug!(obj_num, stream_num, "materialized compressed object");
                }
            }
        }
    }

    Ok(())
}

fn collect_stats(xref: &XRefTable, stats: &mut ReadStats) {
    let mut total: u64 = 0;
    let mut image: u64 = 0;
    let mut font: u64 = 0;
    let mut count: u64 = 0;

    for number in 0..xref.size() {
        let Some(entry) = xref.find(number) else { continue };
        if entry.kind != EntryKind::InUse {
            continue;
        }
        count += 1;
        let Some(Object::Stream(stream)) = &entry.object else {
            continue;
        };
        let len = stream.raw_len() as u64;
        total += len;
        match stream.dict.subtype_name() {
            Some(b"Image") => image += len,
            _ if is_font_program(&stream.dict) => font += len,
            _ => {}
        }
    }

    stats.total_binary_size = total;
    stats.image_binary_size = image;
    stats.font_binary_size = font;
    stats.object_count = count;
}

fn is_font_program(dict: &pdf_object::Dict) -> bool {
    matches!(
        dict.type_name(),
        Some(b"FontFile") | Some(b"FontFile2") | Some(b"FontFile3")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_pdf() -> Vec<u8> {
        let header = b"%PDF-1.4\n".to_vec();
        let obj1 = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_vec();
        let obj2 = b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n".to_vec();

        let obj1_offset = header.len();
        let obj2_offset = obj1_offset + obj1.len();

        let mut file = header;
        file.extend_from_slice(&obj1);
        file.extend_from_slice(&obj2);

        let xref_offset = file.len();
        file.extend_from_slice(b"xref\n0 3\n");
        file.extend_from_slice(b"0000000000 65535 f \n");
        file.extend_from_slice(format!("{:010} 00000 n \n", obj1_offset).as_bytes());
        file.extend_from_slice(format!("{:010} 00000 n \n", obj2_offset).as_bytes());
        file.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        file.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());
        file
    }

    #[test]
    fn reads_minimal_unencrypted_document() {
        let data = minimal_pdf();
        let result = read(&data, &Config::default()).unwrap();
        assert_eq!(result.header_version, 4);
        assert!(result.access_level.is_none());
        let catalog = result.xref.dereference_dict(&Object::Reference(ObjectId::new(1, 0))).unwrap();
        assert_eq!(catalog.type_name(), Some(b"Catalog".as_slice()));
    }
}
