//! The optimizer (spec §4.8): font, image, and Info-dict deduplication,
//! followed by reference remapping so every surviving pointer targets the
//! kept copy.

use std::collections::HashMap;

use pdf_object::{Dict, Object, ObjectId};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::xref::{EntryKind, XRefTable};

#[derive(Debug, Clone, Default)]
pub struct OptimizeReport {
    pub fonts_deduplicated: u32,
    pub images_deduplicated: u32,
    pub info_dicts_deduplicated: u32,
    pub bytes_reclaimed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeOptions {
    pub dedupe_fonts: bool,
    pub dedupe_images: bool,
    pub dedupe_info: bool,
    pub remove_unused: bool,
}

/// Run every enabled deduplication pass and remap surviving references
/// (spec §4.8). Object numbers that collapse into a survivor are left as
/// unreferenced entries for `remove_unused`/the final write pass to reclaim.
pub fn optimize(xref: &mut XRefTable, opts: OptimizeOptions) -> OptimizeReport {
    let mut report = OptimizeReport::default();

    if opts.dedupe_fonts {
        report.fonts_deduplicated = dedupe_fonts(xref);
    }
    if opts.dedupe_images {
        let (count, bytes) = dedupe_images(xref);
        report.images_deduplicated = count;
        report.bytes_reclaimed += bytes;
    }
    if opts.dedupe_info {
        report.info_dicts_deduplicated = dedupe_info(xref);
    }
    if opts.remove_unused {
        remove_unreferenced(xref);
    }

    report
}

/// Fonts are equivalent when their canonicalized `BaseFont`/`Encoding`/
/// `FontDescriptor`/`ToUnicode` shapes match and (if embedded) their font
/// program bytes are identical (spec §4.8 "Font deduplication").
fn dedupe_fonts(xref: &mut XRefTable) -> u32 {
    let mut canonical: HashMap<Vec<u8>, ObjectId> = HashMap::new();
    let mut remap: HashMap<u32, u32> = HashMap::new();

    for number in 0..xref.size() {
        let Some(entry) = xref.find(number) else { continue };
        if entry.kind != EntryKind::InUse {
            continue;
        }
        let Some(Object::Dict(dict)) = &entry.object else { continue };
        if dict.type_name() != Some(b"Font") {
            continue;
        }
        let key = font_fingerprint(xref, dict);
        match canonical.get(&key) {
            Some(&survivor) if survivor.number != number => {
                remap.insert(number, survivor.number);
            }
            Some(_) => {}
            None => {
                canonical.insert(key, ObjectId::new(number, 0));
            }
        }
    }

    let count = remap.len() as u32;
    remap_references(xref, &remap);
    count
}

fn font_fingerprint(xref: &XRefTable, dict: &Dict) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for key in [b"BaseFont".as_slice(), b"Subtype", b"Encoding"] {
        if let Some(v) = dict.get(key) {
            hasher.update(key);
            hasher.update(xref.resolve(v).to_pdf_bytes());
        }
    }
    if let Some(descriptor) = dict.get(b"FontDescriptor").and_then(|o| xref.dereference_dict(o)) {
        for key in [b"FontFile".as_slice(), b"FontFile2", b"FontFile3"] {
            if let Some(font_file_ref) = descriptor.get(key).and_then(|o| o.as_reference()) {
                if let Ok(bytes) = xref.dereference_stream(font_file_ref) {
                    hasher.update(key);
                    hasher.update(&bytes);
                }
            }
        }
    }
    hasher.finalize().to_vec()
}

/// Images are equivalent when `(Width, Height, BitsPerComponent,
/// ColorSpace, filter chain, SHA-256(raw bytes))` all match (spec §4.8
/// "Image deduplication").
fn dedupe_images(xref: &mut XRefTable) -> (u32, u64) {
    let mut canonical: HashMap<Vec<u8>, u32> = HashMap::new();
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut bytes_reclaimed = 0u64;

    for number in 0..xref.size() {
        let Some(entry) = xref.find(number) else { continue };
        if entry.kind != EntryKind::InUse {
            continue;
        }
        let Some(Object::Stream(stream)) = &entry.object else { continue };
        if stream.dict.subtype_name() != Some(b"Image") {
            continue;
        }
        let key = image_fingerprint(&stream.dict, stream.data.bytes());
        match canonical.get(&key) {
            Some(&survivor) if survivor != number => {
                remap.insert(number, survivor);
                bytes_reclaimed += stream.raw_len() as u64;
            }
            Some(_) => {}
            None => {
                canonical.insert(key, number);
            }
        }
    }

    let count = remap.len() as u32;
    remap_references(xref, &remap);
    (count, bytes_reclaimed)
}

fn image_fingerprint(dict: &Dict, raw: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(dict.int_entry(b"Width").unwrap_or(0).to_le_bytes());
    hasher.update(dict.int_entry(b"Height").unwrap_or(0).to_le_bytes());
    hasher.update(dict.int_entry(b"BitsPerComponent").unwrap_or(0).to_le_bytes());
    if let Some(cs) = dict.name_entry(b"ColorSpace") {
        hasher.update(cs);
    }
    for (kind, _) in pdf_filters::filter_chain(dict) {
        hasher.update(format!("{kind:?}"));
    }
    hasher.update(Sha256::digest(raw));
    hasher.finalize().to_vec()
}

/// The trailer's `/Info` dict is kept as a single copy; duplicate `/Info`
/// objects reachable through earlier incremental-update trailers collapse
/// into the first one encountered (spec §4.8 "Info-dict deduplication").
fn dedupe_info(xref: &mut XRefTable) -> u32 {
    let mut seen: HashMap<Vec<u8>, u32> = HashMap::new();
    let mut remap: HashMap<u32, u32> = HashMap::new();

    for number in 0..xref.size() {
        let Some(entry) = xref.find(number) else { continue };
        if entry.kind != EntryKind::InUse {
            continue;
        }
        let Some(Object::Dict(dict)) = &entry.object else { continue };
        let looks_like_info = dict.contains_key(b"Title")
            || dict.contains_key(b"Author")
            || dict.contains_key(b"Producer")
            || dict.contains_key(b"CreationDate");
        if !looks_like_info {
            continue;
        }
        let fingerprint = Object::Dict(dict.clone()).to_pdf_bytes();
        match seen.get(&fingerprint) {
            Some(&survivor) if survivor != number => {
                remap.insert(number, survivor);
            }
            Some(_) => {}
            None => {
                seen.insert(fingerprint, number);
            }
        }
    }

    let count = remap.len() as u32;
    remap_references(xref, &remap);
    count
}

/// Rewrite every `Reference` in every in-use object (and the trailer) that
/// points at a collapsed object number to point at its survivor, then free
/// the now-orphaned objects.
fn remap_references(xref: &mut XRefTable, remap: &HashMap<u32, u32>) {
    if remap.is_empty() {
        return;
    }
    for number in 0..xref.size() {
        if remap.contains_key(&number) {
            continue;
        }
        if let Some(entry) = xref.find_mut(number) {
            if entry.kind == EntryKind::InUse {
                if let Some(obj) = entry.object.as_mut() {
                    rewrite_references(obj, remap);
                }
            }
        }
    }
    rewrite_dict_references(&mut xref.trailer, remap);
    for (&old, _) in remap {
        debug!(old, "collapsing duplicate object into survivor");
        xref.delete(old);
    }
}

fn rewrite_references(obj: &mut Object, remap: &HashMap<u32, u32>) {
    match obj {
        Object::Reference(id) => {
            if let Some(&survivor) = remap.get(&id.number) {
                id.number = survivor;
                id.generation = 0;
            }
        }
        Object::Array(items) => items.iter_mut().for_each(|o| rewrite_references(o, remap)),
        Object::Dict(dict) => rewrite_dict_references(dict, remap),
        Object::Stream(stream) => rewrite_dict_references(&mut stream.dict, remap),
        _ => {}
    }
}

fn rewrite_dict_references(dict: &mut Dict, remap: &HashMap<u32, u32>) {
    for (_, v) in dict.iter_mut() {
        rewrite_references(v, remap);
    }
}

/// Drop any in-use object with zero incoming references left after
/// remapping, starting from the trailer's roots (spec §4.8
/// "remove_unused").
fn remove_unreferenced(xref: &mut XRefTable) {
    let mut reachable = std::collections::HashSet::new();
    let mut stack = vec![];
    collect_refs_from_dict(&xref.trailer, &mut stack);
    while let Some(n) = stack.pop() {
        if !reachable.insert(n) {
            continue;
        }
        if let Some(Object::Dict(d)) = xref.find(n).and_then(|e| e.object.as_ref()) {
            collect_refs_from_dict(d, &mut stack);
        } else if let Some(Object::Stream(s)) = xref.find(n).and_then(|e| e.object.as_ref()) {
            collect_refs_from_dict(&s.dict, &mut stack);
        } else if let Some(Object::Array(a)) = xref.find(n).and_then(|e| e.object.as_ref()) {
            for item in a {
                collect_refs(item, &mut stack);
            }
        }
    }

    for number in 1..xref.size() {
        let is_in_use = xref.find(number).map(|e| e.kind == EntryKind::InUse).unwrap_or(false);
        if is_in_use && !reachable.contains(&number) {
            xref.delete(number);
        }
    }
}

fn collect_refs_from_dict(dict: &Dict, out: &mut Vec<u32>) {
    for (_, v) in dict.iter() {
        collect_refs(v, out);
    }
}

fn collect_refs(obj: &Object, out: &mut Vec<u32>) {
    match obj {
        Object::Reference(id) => out.push(id.number),
        Object::Array(items) => items.iter().for_each(|o| collect_refs(o, out)),
        Object::Dict(d) => collect_refs_from_dict(d, out),
        Object::Stream(s) => collect_refs_from_dict(&s.dict, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_object::Stream;
    use pretty_assertions::assert_eq;

    fn font_dict(base: &str) -> Dict {
        let mut d = Dict::new();
        d.set(b"Type".to_vec(), Object::Name(b"Font".to_vec()));
        d.set(b"Subtype".to_vec(), Object::Name(b"Type1".to_vec()));
        d.set(b"BaseFont".to_vec(), Object::Name(base.as_bytes().to_vec()));
        d
    }

    #[test]
    fn identical_fonts_collapse_to_one_survivor() {
        let mut xref = XRefTable::new();
        let a = xref.insert_new(Object::Dict(font_dict("Helvetica")));
        let b = xref.insert_new(Object::Dict(font_dict("Helvetica")));
        let mut page = Dict::new();
        page.set(b"FontA".to_vec(), Object::Reference(a));
        page.set(b"FontB".to_vec(), Object::Reference(b));
        let page_id = xref.insert_new(Object::Dict(page));
        xref.trailer.set(b"Root".to_vec(), Object::Reference(page_id));

        let report = optimize(&mut xref, OptimizeOptions { dedupe_fonts: true, ..Default::default() });
        assert_eq!(report.fonts_deduplicated, 1);

        let page = xref.dereference_dict(&Object::Reference(page_id)).unwrap();
        let font_a = page.get(b"FontA").unwrap().as_reference().unwrap();
        let font_b = page.get(b"FontB").unwrap().as_reference().unwrap();
        assert_eq!(font_a, font_b);
    }

    #[test]
    fn identical_images_collapse_and_orphan_is_freed() {
        let mut xref = XRefTable::new();
        let mut dict = Dict::new();
        dict.set(b"Subtype".to_vec(), Object::Name(b"Image".to_vec()));
        dict.set(b"Width".to_vec(), Object::Integer(10));
        dict.set(b"Height".to_vec(), Object::Integer(10));
        let a = xref.insert_new(Object::Stream(Stream::new_raw(dict.clone(), vec![1, 2, 3])));
        let b = xref.insert_new(Object::Stream(Stream::new_raw(dict, vec![1, 2, 3])));
        xref.trailer.set(b"A".to_vec(), Object::Reference(a));
        xref.trailer.set(b"B".to_vec(), Object::Reference(b));

        let report = optimize(&mut xref, OptimizeOptions { dedupe_images: true, ..Default::default() });
        assert_eq!(report.images_deduplicated, 1);
        assert_eq!(xref.trailer.get(b"B").unwrap(), xref.trailer.get(b"A").unwrap());
    }

    #[test]
    fn remove_unused_drops_unreachable_objects() {
        let mut xref = XRefTable::new();
        let reachable = xref.insert_new(Object::Integer(1));
        let orphan = xref.insert_new(Object::Integer(2));
        xref.trailer.set(b"Root".to_vec(), Object::Reference(reachable));

        optimize(&mut xref, OptimizeOptions { remove_unused: true, ..Default::default() });

        assert_eq!(xref.dereference(reachable), Object::Integer(1));
        assert_eq!(xref.dereference(orphan), Object::Null);
    }
}
