//! Page-tree traversal (spec §3.4, §4.4 `page_dict`/`page_dims`) and the
//! page-tree mutation operations built on top of it (spec §4.10).

use std::collections::HashSet;

use pdf_object::{Dict, Object, ObjectId};

use crate::error::PdfError;
use crate::xref::XRefTable;

/// The four attributes that inherit down the page tree (spec §3.4),
/// threaded through traversal and overwritten at each level that sets
/// them.
#[derive(Debug, Clone, Default)]
pub struct InheritedAttrs {
    pub resources: Option<Object>,
    pub media_box: Option<[f64; 4]>,
    pub crop_box: Option<[f64; 4]>,
    pub rotate: Option<i64>,
}

impl InheritedAttrs {
    fn overlay(&self, xref: &XRefTable, node: &Dict) -> Self {
        let mut out = self.clone();
        if let Some(r) = node.get(b"Resources") {
            out.resources = Some(r.clone());
        }
        if let Some(mb) = box_entry(xref, node, b"MediaBox") {
            out.media_box = Some(mb);
        }
        if let Some(cb) = box_entry(xref, node, b"CropBox") {
            out.crop_box = Some(cb);
        }
        if let Some(rot) = node.int_entry(b"Rotate") {
            out.rotate = Some(rot);
        }
        out
    }
}

fn box_entry(xref: &XRefTable, dict: &Dict, key: &[u8]) -> Option<[f64; 4]> {
    let arr = xref.dereference_array(dict.get(key)?)?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (i, o) in arr.iter().enumerate() {
        out[i] = xref.dereference_number(o)?;
    }
    Some(out)
}

/// Walk `Pages` from the root for the `n`th page (0-based), threading
/// `InheritedAttrs` and skipping subtrees whose `Count` is smaller than
/// the remaining budget (spec §4.4 "Page-tree traversal").
pub fn page_dict(
    xref: &XRefTable,
    pages_root: ObjectId,
    mut n: u32,
) -> Option<(ObjectId, Dict, InheritedAttrs)> {
    fn walk(
        xref: &XRefTable,
        id: ObjectId,
        n: &mut u32,
        attrs: &InheritedAttrs,
    ) -> Option<(ObjectId, Dict, InheritedAttrs)> {
        let dict = xref.dereference_dict(&Object::Reference(id))?;
        let here = attrs.overlay(xref, &dict);

        if dict.type_name() == Some(b"Page") {
            return if *n == 0 {
                Some((id, dict, here))
            } else {
                *n -= 1;
                None
            };
        }

        let count = resolved_count(xref, &dict);
        if count < *n {
            *n -= count;
            return None;
        }

        let kids = xref.dereference_array(dict.get(b"Kids").unwrap_or(&Object::Null))?;
        for kid in kids {
            if let Object::Reference(kid_id) = kid {
                if let Some(found) = walk(xref, kid_id, n, &here) {
                    return Some(found);
                }
            }
        }
        None
    }

    walk(xref, pages_root, &mut n, &InheritedAttrs::default())
}

/// A `Pages` node's `Count`, recomputed from the actual leaf count when it
/// doesn't match what's stored (relaxed-mode repair, spec §4.4).
pub fn resolved_count(xref: &XRefTable, dict: &Dict) -> u32 {
    if dict.type_name() == Some(b"Page") {
        return 1;
    }
    let stored = dict.int_entry(b"Count").unwrap_or(-1);
    let actual = actual_leaf_count(xref, dict, &mut HashSet::new());
    if stored >= 0 && stored as u32 == actual {
        stored as u32
    } else {
        actual
    }
}

fn actual_leaf_count(xref: &XRefTable, dict: &Dict, seen: &mut HashSet<u32>) -> u32 {
    if dict.type_name() == Some(b"Page") {
        return 1;
    }
    let Some(kids) = xref.dereference_array(dict.get(b"Kids").unwrap_or(&Object::Null)) else {
        return 0;
    };
    kids.iter()
        .filter_map(|k| match k {
            Object::Reference(id) if seen.insert(id.number) => {
                xref.dereference_dict(k).map(|d| actual_leaf_count(xref, &d, seen))
            }
            _ => None,
        })
        .sum()
}

/// Total page count of the tree rooted at `pages_root`.
pub fn page_count(xref: &XRefTable, pages_root: ObjectId) -> u32 {
    xref.dereference_dict(&Object::Reference(pages_root))
        .map(|d| resolved_count(xref, &d))
        .unwrap_or(0)
}

/// `MediaBox`/`CropBox` in effect for page `n` (spec §4.4 `page_dims`),
/// falling back to the US Letter default when nothing in the ancestor
/// chain sets one.
pub fn page_dims(xref: &XRefTable, pages_root: ObjectId, n: u32) -> Option<[f64; 4]> {
    let (_, _, attrs) = page_dict(xref, pages_root, n)?;
    Some(attrs.media_box.unwrap_or([0.0, 0.0, 612.0, 792.0]))
}

/// Insert an empty `Page` adjacent to each page in `selection` (0-based
/// indices), `before` controlling which side (spec §4.10 "Insert page").
/// Bumps `Count` up the ancestor chain.
pub fn insert_pages(
    xref: &mut XRefTable,
    pages_root: ObjectId,
    selection: &HashSet<u32>,
    before: bool,
) -> Result<(), PdfError> {
    let mut indices: Vec<u32> = selection.iter().copied().collect();
    indices.sort_unstable();
    // Insert from the back so earlier indices stay valid as the tree grows.
    for n in indices.into_iter().rev() {
        let Some((leaf_id, leaf_dict, attrs)) = page_dict(xref, pages_root, n) else {
            continue;
        };
        let Some(Object::Reference(parent_id)) = leaf_dict.get(b"Parent").cloned() else {
            continue;
        };

        let mut new_page = Dict::new();
        new_page.set(b"Type".to_vec(), Object::Name(b"Page".to_vec()));
        new_page.set(b"Parent".to_vec(), Object::Reference(parent_id));
        if let Some(mb) = attrs.media_box {
            new_page.set(
                b"MediaBox".to_vec(),
                Object::Array(mb.iter().map(|v| Object::Real(*v)).collect()),
            );
        }
        let new_id = xref.insert_and_use_recycled(Object::Dict(new_page));

        let Some(Object::Dict(mut parent_dict)) = xref.find(parent_id.number).and_then(|e| e.object.clone()) else {
            continue;
        };
        let mut kids = xref.dereference_array(parent_dict.get(b"Kids").unwrap_or(&Object::Null)).unwrap_or_default();
        let pos = kids
            .iter()
            .position(|k| matches!(k, Object::Reference(id) if *id == leaf_id))
            .unwrap_or(kids.len());
        let insert_at = if before { pos } else { pos + 1 };
        kids.insert(insert_at, Object::Reference(new_id));
        parent_dict.set(b"Kids".to_vec(), Object::Array(kids));
        let new_count = parent_dict.int_entry(b"Count").unwrap_or(0) + 1;
        parent_dict.set(b"Count".to_vec(), Object::Integer(new_count));
        if let Some(entry) = xref.find_mut(parent_id.number) {
            entry.object = Some(Object::Dict(parent_dict));
        }
        bump_ancestor_counts(xref, parent_id, 1);
    }
    Ok(())
}

fn bump_ancestor_counts(xref: &mut XRefTable, mut node_id: ObjectId, delta: i64) {
    loop {
        let Some(Object::Dict(dict)) = xref.find(node_id.number).and_then(|e| e.object.clone()) else {
            return;
        };
        let Some(Object::Reference(parent_id)) = dict.get(b"Parent").cloned() else {
            return;
        };
        let Some(Object::Dict(mut parent_dict)) = xref.find(parent_id.number).and_then(|e| e.object.clone()) else {
            return;
        };
        let new_count = parent_dict.int_entry(b"Count").unwrap_or(0) + delta;
        parent_dict.set(b"Count".to_vec(), Object::Integer(new_count));
        if let Some(entry) = xref.find_mut(parent_id.number) {
            entry.object = Some(Object::Dict(parent_dict));
        }
        node_id = parent_id;
    }
}

/// Remove the selected pages from the tree, walking up decrementing
/// `Count`. Does not free the removed subgraphs; callers that want that
/// call `xref.delete_object_graph` themselves (spec leaves GC explicit).
pub fn remove_pages(xref: &mut XRefTable, pages_root: ObjectId, selection: &HashSet<u32>) {
    let mut indices: Vec<u32> = selection.iter().copied().collect();
    indices.sort_unstable();
    for n in indices.into_iter().rev() {
        let Some((leaf_id, leaf_dict, _)) = page_dict(xref, pages_root, n) else {
            continue;
        };
        let Some(Object::Reference(parent_id)) = leaf_dict.get(b"Parent").cloned() else {
            continue;
        };
        let Some(Object::Dict(mut parent_dict)) = xref.find(parent_id.number).and_then(|e| e.object.clone()) else {
            continue;
        };
        let mut kids = xref.dereference_array(parent_dict.get(b"Kids").unwrap_or(&Object::Null)).unwrap_or_default();
        kids.retain(|k| !matches!(k, Object::Reference(id) if *id == leaf_id));
        parent_dict.set(b"Kids".to_vec(), Object::Array(kids));
        let new_count = (parent_dict.int_entry(b"Count").unwrap_or(1) - 1).max(0);
        parent_dict.set(b"Count".to_vec(), Object::Integer(new_count));
        if let Some(entry) = xref.find_mut(parent_id.number) {
            entry.object = Some(Object::Dict(parent_dict));
        }
        bump_ancestor_counts(xref, parent_id, -1);
    }
}

/// Everything reachable from `root` via indirect references, used to cut
/// a single-page closure out for `extract_pages` (spec §4.10).
pub fn reachable_closure(xref: &XRefTable, root: ObjectId) -> HashSet<u32> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.number) {
            continue;
        }
        let obj = xref.dereference(id);
        let mut refs = Vec::new();
        collect_refs(&obj, &mut refs);
        for r in refs {
            if !seen.contains(&r.number) {
                stack.push(r);
            }
        }
    }
    seen
}

fn collect_refs(obj: &Object, out: &mut Vec<ObjectId>) {
    match obj {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_refs(o, out)),
        Object::Dict(d) => d.iter().for_each(|(_, v)| collect_refs(v, out)),
        Object::Stream(s) => s.dict.iter().for_each(|(_, v)| collect_refs(v, out)),
        _ => {}
    }
}

/// Content-stream state machine used only to detect stamps/watermarks
/// (spec §4.10). Transitions on `BDC`, `EMC`, `BT`, `ET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    Top,
    InBdc(u32),
    InText,
    InArtifact,
}

/// Whether the page's content stream contains a `/Artifact` marked-content
/// block tagged `/Subtype /Watermark` (spec §4.10 "Watermark detection").
/// `tokens` is the content stream split on whitespace; a from-scratch
/// content-stream tokenizer is out of scope, this only needs enough
/// structure to find the `BDC`/`EMC` block boundaries and what operands
/// preceded each `BDC`.
pub fn detect_watermark_tokens(tokens: &[&[u8]]) -> bool {
    let mut state = ContentState::Top;
    let mut depth = 0u32;
    let mut pending_operands: Vec<&[u8]> = Vec::new();

    for tok in tokens {
        match *tok {
            b"BDC" => {
                let is_watermark_artifact = pending_operands.contains(&b"/Artifact".as_slice())
                    && pending_operands.contains(&b"/Watermark".as_slice());
                depth += 1;
                state = if is_watermark_artifact {
                    ContentState::InArtifact
                } else if state == ContentState::InArtifact {
                    state
                } else {
                    ContentState::InBdc(depth)
                };
                pending_operands.clear();
            }
            b"EMC" => {
                depth = depth.saturating_sub(1);
                state = if depth == 0 {
                    ContentState::Top
                } else {
                    ContentState::InBdc(depth)
                };
                pending_operands.clear();
            }
            b"BT" => state = ContentState::InText,
            b"ET" => state = ContentState::Top,
            other => pending_operands.push(other),
        }
        if state == ContentState::InArtifact {
            return true;
        }
    }

    false
}

pub fn detect_page_tree_watermarks(content_bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(content_bytes);
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let byte_tokens: Vec<&[u8]> = tokens.iter().map(|t| t.as_bytes()).collect();
    detect_watermark_tokens(&byte_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single_page_tree(xref: &mut XRefTable) -> ObjectId {
        let mut page = Dict::new();
        page.set(b"Type".to_vec(), Object::Name(b"Page".to_vec()));
        let page_id = xref.insert_and_use_recycled(Object::Dict(page));

        let mut pages = Dict::new();
        pages.set(b"Type".to_vec(), Object::Name(b"Pages".to_vec()));
        pages.set(b"Kids".to_vec(), Object::Array(vec![Object::Reference(page_id)]));
        pages.set(b"Count".to_vec(), Object::Integer(1));
        let pages_id = xref.insert_and_use_recycled(Object::Dict(pages));

        if let Some(Object::Dict(page_dict)) = xref.find_mut(page_id.number).and_then(|e| e.object.as_mut()) {
            page_dict.set(b"Parent".to_vec(), Object::Reference(pages_id));
        }
        pages_id
    }

    #[test]
    fn page_dict_finds_the_single_leaf() {
        let mut xref = XRefTable::new();
        let pages_id = single_page_tree(&mut xref);
        let (_, dict, _) = page_dict(&xref, pages_id, 0).unwrap();
        assert_eq!(dict.type_name(), Some(b"Page".as_slice()));
        assert!(page_dict(&xref, pages_id, 1).is_none());
    }

    #[test]
    fn resolved_count_recomputes_when_stored_count_is_wrong() {
        let mut xref = XRefTable::new();
        let pages_id = single_page_tree(&mut xref);
        if let Some(Object::Dict(d)) = xref.find_mut(pages_id.number).and_then(|e| e.object.as_mut()) {
            d.set(b"Count".to_vec(), Object::Integer(99));
        }
        let dict = xref.dereference_dict(&Object::Reference(pages_id)).unwrap();
        assert_eq!(resolved_count(&xref, &dict), 1);
    }

    #[test]
    fn insert_pages_adjusts_kids_and_count() {
        let mut xref = XRefTable::new();
        let pages_id = single_page_tree(&mut xref);
        insert_pages(&mut xref, pages_id, &HashSet::from([0]), false).unwrap();
        assert_eq!(page_count(&xref, pages_id), 2);
    }

    #[test]
    fn remove_pages_adjusts_kids_and_count() {
        let mut xref = XRefTable::new();
        let pages_id = single_page_tree(&mut xref);
        insert_pages(&mut xref, pages_id, &HashSet::from([0]), false).unwrap();
        assert_eq!(page_count(&xref, pages_id), 2);
        remove_pages(&mut xref, pages_id, &HashSet::from([0]));
        assert_eq!(page_count(&xref, pages_id), 1);
    }

    #[test]
    fn watermark_tokens_detect_artifact_block() {
        let tokens: Vec<&[u8]> = vec![
            b"/Artifact", b"/Watermark", b"BDC", b"1", b"0", b"0", b"rg", b"EMC",
        ];
        assert!(detect_watermark_tokens(&tokens));
    }

    #[test]
    fn artifact_block_without_watermark_subtype_is_not_a_watermark() {
        let tokens: Vec<&[u8]> = vec![b"/Artifact", b"BDC", b"1", b"0", b"0", b"rg", b"EMC"];
        assert!(!detect_watermark_tokens(&tokens));
    }

    #[test]
    fn watermark_tokens_false_on_plain_text() {
        let tokens: Vec<&[u8]> = vec![b"BT", b"/F1", b"12", b"Tf", b"ET"];
        assert!(!detect_watermark_tokens(&tokens));
    }
}
