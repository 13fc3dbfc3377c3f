//! Top-level entry points (spec §6.2): thin, bytes-in/bytes-out functions
//! that wire `reader`/`validator`/`optimizer`/`writer`/`selection` together.
//! No argv parsing or file I/O lives here; that's the CLI collaborator's
//! job (spec §1, out of scope).

use std::collections::HashSet;

use pdf_crypto::{Permissions, SecurityHandler};
use pdf_object::{Dict, Object, ObjectId, Stream};
use tracing::instrument;

use crate::config::Config;
use crate::error::PdfError;
use crate::nametree::{self, TreeKey};
use crate::optimizer::{self, OptimizeOptions, OptimizeReport};
use crate::pagetree;
use crate::reader::{self, ReadResult};
use crate::selection;
use crate::validator::{self, ValidationReport};
use crate::writer;
use crate::xref::XRefTable;

fn root_ids(xref: &XRefTable) -> Result<(ObjectId, Dict, ObjectId), PdfError> {
    let Object::Reference(root_id) = xref.trailer.get(b"Root").cloned().unwrap_or(Object::Null) else {
        return Err(PdfError::MissingRequired {
            context: "trailer".into(),
            entry: "Root".into(),
        });
    };
    let catalog = xref
        .dereference_dict(&Object::Reference(root_id))
        .ok_or_else(|| PdfError::MissingRequired {
            context: "trailer".into(),
            entry: "Root".into(),
        })?;
    let Some(Object::Reference(pages_id)) = catalog.get(b"Pages").cloned() else {
        return Err(PdfError::MissingRequired {
            context: "Catalog".into(),
            entry: "Pages".into(),
        });
    };
    Ok((root_id, catalog, pages_id))
}

/// spec §6.2 `validate`: read the document and run the catalog validator.
#[instrument(skip(data, config))]
pub fn validate(data: &[u8], config: &Config) -> Result<ValidationReport, PdfError> {
    let mut result = reader::read(data, config)?;
    let (_, catalog, pages_id) = root_ids(&result.xref)?;
    let mut report = validator::validate_catalog(
        &mut result.xref,
        &catalog,
        file_version_number(data, result.header_version),
        config.validation_mode,
    )?;
    report.page_count = pagetree::page_count(&result.xref, pages_id);
    Ok(report)
}

fn file_version_number(_data: &[u8], header_version: u8) -> u8 {
    header_version
}

/// spec §6.2 `info`: header version, page count, and whether the document
/// carries an `/Encrypt` dict.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub header_version: u8,
    pub page_count: u32,
    pub is_encrypted: bool,
    pub info_dict: Dict,
}

#[instrument(skip(data, config))]
pub fn info(data: &[u8], config: &Config) -> Result<DocumentInfo, PdfError> {
    let result = reader::read(data, config)?;
    let (_, _, pages_id) = root_ids(&result.xref)?;
    let info_dict = result
        .xref
        .trailer
        .get(b"Info")
        .and_then(|o| result.xref.dereference_dict(o))
        .unwrap_or_default();
    Ok(DocumentInfo {
        header_version: result.header_version,
        page_count: pagetree::page_count(&result.xref, pages_id),
        is_encrypted: result.xref.trailer.contains_key(b"Encrypt"),
        info_dict,
    })
}

/// spec §6.2 `optimize`: dedupe fonts/images/info dicts, drop anything the
/// trailer can no longer reach, and re-serialize.
#[instrument(skip(data, config))]
pub fn optimize(
    data: &[u8],
    config: &Config,
    opts: OptimizeOptions,
) -> Result<(Vec<u8>, OptimizeReport), PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;
    let report = optimizer::optimize(&mut xref, opts);
    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok((bytes, report))
}

/// spec §6.2 `trim`: drop the pages named by `selection`, keeping the rest.
#[instrument(skip(data, config))]
pub fn trim(data: &[u8], config: &Config, selection_expr: &str) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;
    let (_, _, pages_id) = root_ids(&xref)?;
    let page_count = pagetree::page_count(&xref, pages_id);
    let remove = selection::apply_selection(selection_expr, page_count)?;
    let zero_based: HashSet<u32> = remove.into_iter().map(|p| p - 1).collect();
    pagetree::remove_pages(&mut xref, pages_id, &zero_based);
    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

/// spec §6.2 `extract_pages`: keep only the pages named by `selection`,
/// dropping everything else the trailer no longer reaches.
#[instrument(skip(data, config))]
pub fn extract_pages(data: &[u8], config: &Config, selection_expr: &str) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let xref = result.xref;
    let (root_id, _, pages_id) = root_ids(&xref)?;
    let page_count = pagetree::page_count(&xref, pages_id);
    let keep = selection::apply_selection(selection_expr, page_count)?;

    let mut reachable = HashSet::new();
    reachable.insert(root_id.number);
    for page in keep {
        if let Some((leaf_id, _, _)) = pagetree::page_dict(&xref, pages_id, page - 1) {
            reachable.extend(pagetree::reachable_closure(&xref, leaf_id));
        }
    }
    reachable.insert(pages_id.number);

    let (bytes, _) = writer::write_selection(&xref, result.header_version, &config.clone().normalized(), &reachable)?;
    Ok(bytes)
}

/// spec §6.2 `split`: one single-page document per page.
#[instrument(skip(data, config))]
pub fn split(data: &[u8], config: &Config) -> Result<Vec<Vec<u8>>, PdfError> {
    let result = reader::read(data, config)?;
    let (_, _, pages_id) = root_ids(&result.xref)?;
    let count = pagetree::page_count(&result.xref, pages_id);
    let mut out = Vec::with_capacity(count as usize);
    for n in 1..=count {
        out.push(extract_pages(data, config, &n.to_string())?);
    }
    Ok(out)
}

/// spec §6.2 `merge`: concatenate each document's page tree into the first
/// document, renumbering objects to avoid collisions (grounded in the same
/// "import with an offset, then splice into Kids" approach a join tool uses
/// for this, here done object-by-object against our own `XRefTable` instead
/// of a byte-range splice).
#[instrument(skip(documents, config))]
pub fn merge(documents: Vec<Vec<u8>>, config: &Config) -> Result<Vec<u8>, PdfError> {
    let Some((first, rest)) = documents.split_first() else {
        return Err(PdfError::InvalidValue {
            entry: "documents".into(),
            reason: "merge requires at least one document".into(),
        });
    };

    let base = reader::read(first, config)?;
    let mut xref = base.xref;
    let (_, _, pages_id) = root_ids(&xref)?;

    for doc in rest {
        let incoming = reader::read(doc, config)?;
        let (_, _, incoming_pages_id) = root_ids(&incoming.xref)?;
        import_page_tree(&mut xref, &incoming.xref, incoming_pages_id, pages_id)?;
    }

    let (bytes, _) = writer::write(&xref, base.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

/// Copy every page under `src_pages_id` (in `src`) into fresh objects in
/// `dst`, appended as new `Kids` of `dst_pages_id`.
fn import_page_tree(
    dst: &mut crate::xref::XRefTable,
    src: &crate::xref::XRefTable,
    src_pages_id: ObjectId,
    dst_pages_id: ObjectId,
) -> Result<(), PdfError> {
    let count = pagetree::page_count(src, src_pages_id);
    let mut remap: std::collections::HashMap<u32, ObjectId> = std::collections::HashMap::new();

    for n in 0..count {
        let Some((leaf_id, _, _)) = pagetree::page_dict(src, src_pages_id, n) else {
            continue;
        };
        let closure = pagetree::reachable_closure(src, leaf_id);
        for number in closure {
            // `insert_new` actually reserves the slot; `ind_ref_for_new_object`
            // only peeks and would hand out the same number for every entry
            // in this loop.
            remap.entry(number).or_insert_with(|| dst.insert_new(Object::Null));
        }
    }

    for (&old_number, &new_id) in &remap {
        let obj = src.dereference(ObjectId::new(old_number, 0));
        let remapped = remap_object_refs(obj, &remap);
        dst.set_entry(new_id.number, crate::xref::Entry::in_use(0, new_id.generation, remapped));
    }

    for n in 0..count {
        let Some((leaf_id, _, _)) = pagetree::page_dict(src, src_pages_id, n) else {
            continue;
        };
        let Some(&new_leaf_id) = remap.get(&leaf_id.number) else {
            continue;
        };
        if let Some(Object::Dict(mut leaf)) = dst.find(new_leaf_id.number).and_then(|e| e.object.clone()) {
            leaf.set(b"Parent".to_vec(), Object::Reference(dst_pages_id));
            if let Some(entry) = dst.find_mut(new_leaf_id.number) {
                entry.object = Some(Object::Dict(leaf));
            }
        }
        if let Some(Object::Dict(mut pages)) = dst.find(dst_pages_id.number).and_then(|e| e.object.clone()) {
            let mut kids = dst
                .dereference_array(pages.get(b"Kids").unwrap_or(&Object::Null))
                .unwrap_or_default();
            kids.push(Object::Reference(new_leaf_id));
            let new_count = kids.len() as i64;
            pages.set(b"Kids".to_vec(), Object::Array(kids));
            pages.set(b"Count".to_vec(), Object::Integer(new_count));
            if let Some(entry) = dst.find_mut(dst_pages_id.number) {
                entry.object = Some(Object::Dict(pages));
            }
        }
    }

    Ok(())
}

fn remap_object_refs(obj: Object, remap: &std::collections::HashMap<u32, ObjectId>) -> Object {
    match obj {
        Object::Reference(id) => match remap.get(&id.number) {
            Some(&new_id) => Object::Reference(new_id),
            None => Object::Null,
        },
        Object::Array(items) => Object::Array(items.into_iter().map(|o| remap_object_refs(o, remap)).collect()),
        Object::Dict(mut dict) => {
            for (_, v) in dict.iter_mut() {
                *v = remap_object_refs(std::mem::replace(v, Object::Null), remap);
            }
            Object::Dict(dict)
        }
        Object::Stream(mut stream) => {
            for (_, v) in stream.dict.iter_mut() {
                *v = remap_object_refs(std::mem::replace(v, Object::Null), remap);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// spec §6.2 `extract_images`: decoded bytes of every `/Image` XObject
/// stream.
#[instrument(skip(data, config))]
pub fn extract_images(data: &[u8], config: &Config) -> Result<Vec<Vec<u8>>, PdfError> {
    let result = reader::read(data, config)?;
    extract_streams_by(&result, |dict| dict.subtype_name() == Some(b"Image"))
}

/// spec §6.2 `extract_fonts`: raw embedded font program bytes
/// (`FontFile`/`FontFile2`/`FontFile3`).
#[instrument(skip(data, config))]
pub fn extract_fonts(data: &[u8], config: &Config) -> Result<Vec<Vec<u8>>, PdfError> {
    let result = reader::read(data, config)?;
    extract_streams_by(&result, |dict| {
        matches!(dict.type_name(), Some(b"FontFile") | Some(b"FontFile2") | Some(b"FontFile3"))
    })
}

fn extract_streams_by(
    result: &ReadResult,
    pred: impl Fn(&Dict) -> bool,
) -> Result<Vec<Vec<u8>>, PdfError> {
    let mut out = Vec::new();
    for number in 0..result.xref.size() {
        let Some(entry) = result.xref.find(number) else { continue };
        if entry.kind != crate::xref::EntryKind::InUse {
            continue;
        }
        let Some(Object::Stream(stream)) = &entry.object else {
            continue;
        };
        if pred(&stream.dict) {
            out.push(result.xref.dereference_stream(ObjectId::new(number, entry.generation))?);
        }
    }
    Ok(out)
}

/// spec §6.2 `encrypt`: establish a fresh `/Encrypt` dict and mark the
/// reader's working key on the in-memory table so the writer re-encrypts
/// every string and stream at serialize time.
#[instrument(skip(data, config))]
pub fn encrypt(
    data: &[u8],
    config: &Config,
    permissions: Permissions,
    v: u8,
    r: u8,
) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;

    let id0 = xref
        .trailer
        .array_entry(b"ID")
        .and_then(|a| a.first())
        .and_then(|o| xref.dereference_string(o))
        .unwrap_or_else(|| vec![0u8; 16]);

    let key_len_bytes = if config.encrypt_using_128_bit_key { 16 } else { 5 };
    let user_pw_str = config.user_pw_new.as_deref().unwrap_or("");
    let owner_pw_str = config.owner_pw_new.as_deref().unwrap_or(user_pw_str);
    let user_pw = user_pw_str.as_bytes();
    let owner_pw = owner_pw_str.as_bytes();

    let setup = SecurityHandler::new_for_encryption(
        v,
        r,
        user_pw,
        owner_pw,
        permissions,
        &id0,
        key_len_bytes,
        config.encrypt_using_aes,
        true,
    );

    let mut encrypt_dict = Dict::new();
    encrypt_dict.set(b"Filter".to_vec(), Object::Name(b"Standard".to_vec()));
    encrypt_dict.set(b"V".to_vec(), Object::Integer(v as i64));
    encrypt_dict.set(b"R".to_vec(), Object::Integer(r as i64));
    encrypt_dict.set(b"O".to_vec(), Object::StringLiteral(setup.o));
    encrypt_dict.set(b"U".to_vec(), Object::StringLiteral(setup.u));
    if !setup.oe.is_empty() {
        encrypt_dict.set(b"OE".to_vec(), Object::StringLiteral(setup.oe));
    }
    if !setup.ue.is_empty() {
        encrypt_dict.set(b"UE".to_vec(), Object::StringLiteral(setup.ue));
    }
    encrypt_dict.set(b"P".to_vec(), Object::Integer(setup.handler.permissions.to_p() as i64));
    encrypt_dict.set(b"Length".to_vec(), Object::Integer((key_len_bytes * 8) as i64));

    let encrypt_id = xref.insert_and_use_recycled(Object::Dict(encrypt_dict));
    xref.trailer.set(b"Encrypt".to_vec(), Object::Reference(encrypt_id));
    xref.crypt = Some(setup.handler);

    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

/// spec §6.2 `decrypt`: authenticate (already done by `reader::read`) and
/// re-serialize with no `/Encrypt` entry, leaving every string/stream
/// plaintext.
#[instrument(skip(data, config))]
pub fn decrypt(data: &[u8], config: &Config) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    if result.xref.trailer.contains_key(b"Encrypt") && result.access_level.is_none() {
        return Err(PdfError::AuthenticationRequired);
    }
    let mut xref = result.xref;
    xref.trailer.remove(b"Encrypt");
    xref.crypt = None;
    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

/// spec §6.2 `change_user_pw` / `change_owner_pw`: re-authenticate, then
/// re-derive `O`/`U` (and `OE`/`UE` for R6) under the new password,
/// preserving `V`/`R`/permissions.
#[instrument(skip(data, config))]
pub fn change_user_pw(data: &[u8], config: &Config, new_user_pw: &str) -> Result<Vec<u8>, PdfError> {
    change_password(data, config, Some(new_user_pw), None)
}

#[instrument(skip(data, config))]
pub fn change_owner_pw(data: &[u8], config: &Config, new_owner_pw: &str) -> Result<Vec<u8>, PdfError> {
    change_password(data, config, None, Some(new_owner_pw))
}

fn change_password(
    data: &[u8],
    config: &Config,
    new_user_pw: Option<&str>,
    new_owner_pw: Option<&str>,
) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;
    let Some(handler) = xref.crypt.clone() else {
        return Err(PdfError::UnsupportedFeature("document is not encrypted".into()));
    };
    if !handler.is_owner() {
        return Err(PdfError::PermissionDenied);
    }

    let id0 = xref
        .trailer
        .array_entry(b"ID")
        .and_then(|a| a.first())
        .and_then(|o| xref.dereference_string(o))
        .unwrap_or_else(|| vec![0u8; 16]);

    let current_user_pw = config.user_pw.as_deref().unwrap_or("");
    let current_owner_pw = config.owner_pw.as_deref().unwrap_or("");
    let next_user_pw = new_user_pw.unwrap_or(current_user_pw);
    let next_owner_pw = new_owner_pw.unwrap_or(current_owner_pw);
    let key_len_bytes = handler.file_key.len();

    let setup = SecurityHandler::new_for_encryption(
        handler.v,
        handler.r,
        next_user_pw.as_bytes(),
        next_owner_pw.as_bytes(),
        handler.permissions,
        &id0,
        key_len_bytes,
        handler.use_aes,
        handler.encrypt_metadata,
    );

    let Object::Reference(encrypt_id) = xref.trailer.get(b"Encrypt").cloned().unwrap_or(Object::Null) else {
        return Err(PdfError::MissingRequired {
            context: "trailer".into(),
            entry: "Encrypt".into(),
        });
    };
    if let Some(Object::Dict(mut encrypt_dict)) = xref.find(encrypt_id.number).and_then(|e| e.object.clone()) {
        encrypt_dict.set(b"O".to_vec(), Object::StringLiteral(setup.o));
        encrypt_dict.set(b"U".to_vec(), Object::StringLiteral(setup.u));
        if !setup.oe.is_empty() {
            encrypt_dict.set(b"OE".to_vec(), Object::StringLiteral(setup.oe));
        }
        if !setup.ue.is_empty() {
            encrypt_dict.set(b"UE".to_vec(), Object::StringLiteral(setup.ue));
        }
        if let Some(entry) = xref.find_mut(encrypt_id.number) {
            entry.object = Some(Object::Dict(encrypt_dict));
        }
    }
    xref.crypt = Some(setup.handler);

    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

/// spec §6.2 `permissions_list`: the permission bits currently in force
/// (requires the document to already be open, i.e. authenticated by
/// `reader::read`).
#[instrument(skip(data, config))]
pub fn permissions_list(data: &[u8], config: &Config) -> Result<Permissions, PdfError> {
    let result = reader::read(data, config)?;
    match result.xref.crypt {
        Some(handler) => Ok(handler.permissions),
        None => Ok(Permissions::from_p(-4)),
    }
}

/// spec §6.2 `permissions_add`: grant additional permission bits by
/// re-encrypting under the existing passwords with the widened bitmask.
#[instrument(skip(data, config))]
pub fn permissions_add(data: &[u8], config: &Config, grant: Permissions) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;
    let Some(mut handler) = xref.crypt.clone() else {
        return Err(PdfError::UnsupportedFeature("document is not encrypted".into()));
    };
    handler.permissions = merge_permissions(handler.permissions, grant);

    let p = handler.permissions.to_p();
    let Object::Reference(encrypt_id) = xref.trailer.get(b"Encrypt").cloned().unwrap_or(Object::Null) else {
        return Err(PdfError::MissingRequired {
            context: "trailer".into(),
            entry: "Encrypt".into(),
        });
    };
    if let Some(Object::Dict(mut encrypt_dict)) = xref.find(encrypt_id.number).and_then(|e| e.object.clone()) {
        encrypt_dict.set(b"P".to_vec(), Object::Integer(p as i64));
        if let Some(entry) = xref.find_mut(encrypt_id.number) {
            entry.object = Some(Object::Dict(encrypt_dict));
        }
    }
    xref.crypt = Some(handler);

    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

fn merge_permissions(base: Permissions, grant: Permissions) -> Permissions {
    Permissions::from_p(base.to_p() | grant.to_p())
}

/// One entry in an `/EmbeddedFiles` name tree (spec §3.3, §6.2
/// `attachments_list`).
#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: Vec<u8>,
    pub file_spec_id: ObjectId,
}

#[instrument(skip(data, config))]
pub fn attachments_list(data: &[u8], config: &Config) -> Result<Vec<Attachment>, PdfError> {
    let result = reader::read(data, config)?;
    let (_, catalog, _) = root_ids(&result.xref)?;
    let Some(tree) = nametree::locate_name_tree(&result.xref, &catalog, b"EmbeddedFiles") else {
        return Ok(Vec::new());
    };
    Ok(tree
        .flatten()
        .into_iter()
        .filter_map(|(key, value)| {
            let TreeKey::Name(name) = key else { return None };
            let Object::Reference(id) = value else { return None };
            Some(Attachment { name, file_spec_id: id })
        })
        .collect())
}

#[instrument(skip(data, config, bytes))]
pub fn attachments_add(
    data: &[u8],
    config: &Config,
    name: &[u8],
    bytes: Vec<u8>,
) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;
    let (root_id, catalog, _) = root_ids(&xref)?;

    let mut ef_stream = Stream::new_raw(Dict::new(), bytes);
    ef_stream.dict.set(b"Type".to_vec(), Object::Name(b"EmbeddedFile".to_vec()));
    let ef_id = xref.insert_and_use_recycled(Object::Stream(ef_stream));

    let mut ef_wrapper = Dict::new();
    ef_wrapper.set(b"F".to_vec(), Object::Reference(ef_id));
    let mut file_spec = Dict::new();
    file_spec.set(b"Type".to_vec(), Object::Name(b"Filespec".to_vec()));
    file_spec.set(b"F".to_vec(), Object::StringLiteral(name.to_vec()));
    file_spec.set(b"EF".to_vec(), Object::Dict(ef_wrapper));
    let file_spec_id = xref.insert_and_use_recycled(Object::Dict(file_spec));

    let mut tree = nametree::locate_name_tree(&xref, &catalog, b"EmbeddedFiles").unwrap_or_default();
    tree.insert(TreeKey::Name(name.to_vec()), Object::Reference(file_spec_id));
    let tree_root_id = nametree::bind_name_trees(&mut xref, &tree, false, true);

    let mut names = xref
        .dereference_dict(catalog.get(b"Names").unwrap_or(&Object::Null))
        .unwrap_or_default();
    names.set(b"EmbeddedFiles".to_vec(), Object::Reference(tree_root_id));

    if let Some(Object::Dict(mut catalog_dict)) = xref.find(root_id.number).and_then(|e| e.object.clone()) {
        let names_id = match catalog_dict.get(b"Names").cloned() {
            Some(Object::Reference(id)) => {
                if let Some(entry) = xref.find_mut(id.number) {
                    entry.object = Some(Object::Dict(names));
                }
                id
            }
            _ => xref.insert_and_use_recycled(Object::Dict(names)),
        };
        catalog_dict.set(b"Names".to_vec(), Object::Reference(names_id));
        if let Some(entry) = xref.find_mut(root_id.number) {
            entry.object = Some(Object::Dict(catalog_dict));
        }
    }

    let (out, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(out)
}

#[instrument(skip(data, config))]
pub fn attachments_remove(data: &[u8], config: &Config, name: &[u8]) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let mut xref = result.xref;
    let (root_id, catalog, _) = root_ids(&xref)?;

    let Some(mut tree) = nametree::locate_name_tree(&xref, &catalog, b"EmbeddedFiles") else {
        return writer::write(&xref, result.header_version, &config.clone().normalized()).map(|(b, _)| b);
    };

    let removed_id = tree.get(&TreeKey::Name(name.to_vec())).and_then(|o| match o {
        Object::Reference(id) => Some(*id),
        _ => None,
    });
    tree.entries.retain(|(k, _)| *k != TreeKey::Name(name.to_vec()));
    for kid in &mut tree.kids {
        kid.entries.retain(|(k, _)| *k != TreeKey::Name(name.to_vec()));
    }

    if let Some(id) = removed_id {
        xref.delete_object_graph(id.number);
    }

    if tree.flatten().is_empty() {
        nametree::remove_name_tree(&mut xref, root_id, b"EmbeddedFiles");
    } else {
        let tree_root_id = nametree::bind_name_trees(&mut xref, &tree, false, true);
        if let Some(Object::Dict(names)) = catalog.get(b"Names").cloned().and_then(|o| match o {
            Object::Reference(id) => xref.find(id.number).and_then(|e| e.object.clone()),
            _ => None,
        }) {
            let mut names = names;
            names.set(b"EmbeddedFiles".to_vec(), Object::Reference(tree_root_id));
            if let Some(Object::Reference(names_id)) = catalog.get(b"Names") {
                if let Some(entry) = xref.find_mut(names_id.number) {
                    entry.object = Some(Object::Dict(names));
                }
            }
        }
    }

    let (bytes, _) = writer::write(&xref, result.header_version, &config.clone().normalized())?;
    Ok(bytes)
}

#[instrument(skip(data, config))]
pub fn attachments_extract(data: &[u8], config: &Config, name: &[u8]) -> Result<Vec<u8>, PdfError> {
    let result = reader::read(data, config)?;
    let (_, catalog, _) = root_ids(&result.xref)?;
    let tree = nametree::locate_name_tree(&result.xref, &catalog, b"EmbeddedFiles")
        .ok_or_else(|| PdfError::MissingRequired {
            context: "Names".into(),
            entry: "EmbeddedFiles".into(),
        })?;
    let Some(Object::Reference(file_spec_id)) = tree.get(&TreeKey::Name(name.to_vec())).cloned() else {
        return Err(PdfError::InvalidValue {
            entry: "attachment name".into(),
            reason: format!("{:?} not found", String::from_utf8_lossy(name)),
        });
    };
    let file_spec = result
        .xref
        .dereference_dict(&Object::Reference(file_spec_id))
        .ok_or_else(|| PdfError::InvalidObject {
            offset: 0,
            reason: "Filespec dict missing".into(),
        })?;
    let ef = file_spec.dict_entry(b"EF").ok_or_else(|| PdfError::MissingRequired {
        context: "Filespec".into(),
        entry: "EF".into(),
    })?;
    let Some(Object::Reference(stream_id)) = ef.get(b"F").cloned() else {
        return Err(PdfError::MissingRequired {
            context: "EF".into(),
            entry: "F".into(),
        });
    };
    result.xref.dereference_stream(stream_id)
}
