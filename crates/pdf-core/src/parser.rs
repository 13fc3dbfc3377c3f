//! The recovering parser (spec §4.5): turns bytes into `Object`s, and
//! reconstructs an `XRefTable` from a possibly-damaged trailer chain.
//!
//! Crypto is deliberately absent from this module. Parsing is a syntactic
//! operation — string literals and raw stream bytes come out exactly as
//! written, ciphertext and all, when the document is encrypted. Decryption
//! happens afterward in `reader`, once a `SecurityHandler` exists.

use std::collections::{HashMap, HashSet};

use pdf_object::{Dict, Object, ObjectId, Stream, StreamData};

use crate::error::PdfError;
use crate::lexer::{Lexer, Token};
use crate::xref::{Entry, EntryKind, XRefTable, FREE_GENERATION_FOREVER};

/// Parse one PDF value starting at the lexer's current position. Handles
/// the `n g R` indirect-reference lookahead and, for dicts immediately
/// followed by `stream`, reads the raw payload inline.
pub fn parse_value(lexer: &mut Lexer) -> Object {
    match lexer.next_token() {
        Token::Integer(n) => parse_integer_or_reference(lexer, n),
        Token::Real(f) => Object::Real(f),
        Token::Name(name) => Object::Name(name),
        Token::StringLiteral(s) => Object::StringLiteral(s),
        Token::HexLiteral(s) => Object::HexLiteral(s),
        Token::ArrayStart => parse_array(lexer),
        Token::DictStart => parse_dict_or_stream(lexer),
        Token::Keyword(k) if k == b"true" => Object::Boolean(true),
        Token::Keyword(k) if k == b"false" => Object::Boolean(false),
        Token::Keyword(_) => Object::Null,
        Token::ArrayEnd | Token::DictEnd | Token::Eof => Object::Null,
    }
}

fn parse_integer_or_reference(lexer: &mut Lexer, n: i64) -> Object {
    let save = lexer.pos;
    if let Token::Integer(g) = lexer.next_token() {
        let save2 = lexer.pos;
        if let Token::Keyword(k) = lexer.next_token() {
            if k == b"R" && (0..=u32::MAX as i64).contains(&n) && (0..=u16::MAX as i64).contains(&g) {
                return Object::Reference(ObjectId::new(n as u32, g as u16));
            }
        }
        lexer.pos = save2;
    }
    lexer.pos = save;
    Object::Integer(n)
}

fn parse_array(lexer: &mut Lexer) -> Object {
    let mut items = Vec::new();
    loop {
        let save = lexer.pos;
        match lexer.next_token() {
            Token::ArrayEnd | Token::Eof => break,
            _ => {
                lexer.pos = save;
                items.push(parse_value(lexer));
            }
        }
    }
    Object::Array(items)
}

fn parse_dict_or_stream(lexer: &mut Lexer) -> Object {
    let mut dict = Dict::new();
    loop {
        let save = lexer.pos;
        match lexer.next_token() {
            Token::DictEnd | Token::Eof => break,
            Token::Name(key) => {
                let value = parse_value(lexer);
                dict.set(key, value);
            }
            _ => {
                lexer.pos = save;
                break;
            }
        }
    }

    let save = lexer.pos;
    lexer.skip_whitespace_and_comments();
    if matches!(lexer.next_token(), Token::Keyword(k) if k == b"stream") {
        lexer.skip_stream_eol();
        let raw = read_stream_body(lexer, &dict);
        return Object::Stream(Stream {
            dict,
            data: StreamData::Raw(raw),
        });
    }
    lexer.pos = save;
    Object::Dict(dict)
}

/// Read a stream's raw payload (spec §4.5 "Stream length resolution"):
/// trust a directly-stated `/Length`, otherwise scan for `endstream`
/// preceded by an EOL and back-compute the length, updating the dict.
fn read_stream_body(lexer: &mut Lexer, dict: &mut Dict) -> Vec<u8> {
    let input = lexer.input();
    let start = lexer.pos;

    if let Some(len) = dict.int_entry(b"Length") {
        if len >= 0 {
            let end = (start + len as usize).min(input.len());
            if looks_like_endstream_follows(input, end) {
                lexer.pos = end;
                skip_past_endstream(lexer);
                return input[start..end].to_vec();
            }
        }
    }

    let end = find_endstream(input, start);
    lexer.pos = end;
    skip_past_endstream(lexer);
    dict.set(b"Length".to_vec(), Object::Integer((end - start) as i64));
    input[start..end].to_vec()
}

fn looks_like_endstream_follows(input: &[u8], at: usize) -> bool {
    let mut i = at;
    while input.get(i).map(|b| matches!(b, b'\r' | b'\n')).unwrap_or(false) {
        i += 1;
    }
    input[i..].starts_with(b"endstream")
}

fn find_endstream(input: &[u8], start: usize) -> usize {
    const NEEDLE: &[u8] = b"endstream";
    let mut i = start;
    while i + NEEDLE.len() <= input.len() {
        if &input[i..i + NEEDLE.len()] == NEEDLE {
            let mut end = i;
            if end > start && input[end - 1] == b'\n' {
                end -= 1;
                if end > start && input[end - 1] == b'\r' {
                    end -= 1;
                }
            } else if end > start && input[end - 1] == b'\r' {
                end -= 1;
            }
            return end;
        }
        i += 1;
    }
    input.len()
}

fn skip_past_endstream(lexer: &mut Lexer) {
    lexer.skip_whitespace_and_comments();
    if let Token::Keyword(k) = lexer.next_token() {
        if k != b"endstream" {
            // Not actually there (a relaxed-mode best-effort scan landed
            // short); leave position as-is rather than eating real content.
        }
    }
}

/// Parse `n g obj ... endobj` starting at `lexer.pos`.
pub fn parse_indirect_object(lexer: &mut Lexer) -> Option<(ObjectId, Object)> {
    let Token::Integer(n) = lexer.next_token() else {
        return None;
    };
    let Token::Integer(g) = lexer.next_token() else {
        return None;
    };
    match lexer.next_token() {
        Token::Keyword(k) if k == b"obj" => {}
        _ => return None,
    }
    let value = parse_value(lexer);
    let save = lexer.pos;
    if !matches!(lexer.next_token(), Token::Keyword(k) if k == b"endobj") {
        lexer.pos = save;
    }
    Some((ObjectId::new(n as u32, g as u16), value))
}

#[derive(Debug, Clone)]
enum RawKind {
    Free { next: u32 },
    InUse { offset: u64 },
    Compressed { stream_num: u32, index: u32 },
}

#[derive(Debug, Clone)]
struct RawEntry {
    generation: u16,
    kind: RawKind,
}

/// The file-level recovery algorithm (spec §4.5): locate `%%EOF` /
/// `startxref`, follow the `/Prev` trailer chain, and merge classical and
/// xref-stream sections into one dense `XRefTable`. Regular `InUse`
/// objects are parsed eagerly (raw, undecrypted); `Compressed` entries are
/// left unmaterialized for `reader` to fill in once decryption is set up.
pub fn recover_xref(data: &[u8]) -> Result<XRefTable, PdfError> {
    let mut raw: HashMap<u32, RawEntry> = HashMap::new();
    let mut trailer = Dict::new();
    let mut visited_offsets = HashSet::new();

    let mut next_offset = locate_startxref(data).or_else(|| locate_first_xref_keyword(data));

    while let Some(offset) = next_offset {
        if offset >= data.len() || !visited_offsets.insert(offset) {
            break; // circular /Prev chain: log-and-stop per spec §9 open question
        }

        let mut lexer = Lexer::at(data, offset);
        lexer.skip_whitespace_and_comments();

        let section_trailer = if looks_like_classical_xref(&lexer) {
            parse_classical_section(&mut lexer, &mut raw)
        } else {
            parse_xref_stream_section(&mut lexer, &mut raw)?
        };

        // Earlier (higher /Prev) trailers never override keys a later
        // trailer already set (spec §4.5 step 3).
        for (k, v) in section_trailer.iter() {
            if !trailer.contains_key(k) {
                trailer.set(k.clone(), v.clone());
            }
        }

        next_offset = section_trailer
            .int_entry(b"Prev")
            .map(|p| p.max(0) as usize);
    }

    let size = trailer.int_entry(b"Size").unwrap_or_else(|| {
        raw.keys().copied().max().map(|m| m as i64 + 1).unwrap_or(1)
    }) as usize;

    let mut table = XRefTable::new();
    table.ensure_size(size.saturating_sub(1) as u32);
    table.trailer = trailer;

    for number in 0..size as u32 {
        match raw.get(&number) {
            Some(RawEntry { generation, kind: RawKind::Free { next } }) => {
                table.set_entry(
                    number,
                    Entry {
                        kind: EntryKind::Free,
                        generation: *generation,
                        offset: *next as u64,
                        object_stream: None,
                        index: None,
                        refcount: 0,
                        object: None,
                        valid: false,
                    },
                );
            }
            Some(RawEntry { generation, kind: RawKind::InUse { offset } }) => {
                let object = parse_indirect_object(&mut Lexer::at(data, *offset as usize))
                    .map(|(_, obj)| obj)
                    .unwrap_or(Object::Null);
                table.set_entry(number, Entry::in_use(*offset, *generation, object));
            }
            Some(RawEntry { kind: RawKind::Compressed { stream_num, index }, .. }) => {
                table.set_entry(number, Entry::compressed(*stream_num, *index, Object::Null));
            }
            None => {
                if number != 0 {
                    table.set_entry(
                        number,
                        Entry {
                            kind: EntryKind::Free,
                            generation: FREE_GENERATION_FOREVER,
                            offset: 0,
                            object_stream: None,
                            index: None,
                            refcount: 0,
                            object: None,
                            valid: false,
                        },
                    );
                }
            }
        }
    }

    table.ensure_valid_free_list();
    Ok(table)
}

fn locate_startxref(data: &[u8]) -> Option<usize> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];
    let pos = find_last(tail, b"startxref")?;
    let mut lexer = Lexer::at(tail, pos + b"startxref".len());
    match lexer.next_token() {
        Token::Integer(n) if n >= 0 => Some(n as usize),
        _ => None,
    }
}

fn locate_first_xref_keyword(data: &[u8]) -> Option<usize> {
    find_first(data, b"xref")
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn find_first(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn looks_like_classical_xref(lexer: &Lexer) -> bool {
    let mut probe = Lexer::at(lexer.input(), lexer.pos);
    matches!(probe.next_token(), Token::Keyword(k) if k == b"xref")
}

fn parse_classical_section(lexer: &mut Lexer, raw: &mut HashMap<u32, RawEntry>) -> Dict {
    lexer.next_token(); // consume "xref"

    loop {
        let save = lexer.pos;
        let (start, count) = match (lexer.next_token(), lexer.next_token()) {
            (Token::Integer(s), Token::Integer(c)) if s >= 0 && c >= 0 => (s as u32, c as u32),
            _ => {
                lexer.pos = save;
                break;
            }
        };

        for i in 0..count {
            let number = start + i;
            let offset = match lexer.next_token() {
                Token::Integer(n) => n.max(0) as u64,
                _ => continue,
            };
            let generation = match lexer.next_token() {
                Token::Integer(n) => n.max(0) as u16,
                _ => continue,
            };
            let kind_flag = match lexer.next_token() {
                Token::Keyword(k) => k,
                _ => continue,
            };

            // Only the first definition for a given number wins (spec
            // §4.5 step 3: later-parsed = newer trailer first).
            raw.entry(number).or_insert(RawEntry {
                generation,
                kind: if kind_flag == b"n" {
                    RawKind::InUse { offset }
                } else {
                    RawKind::Free { next: offset as u32 }
                },
            });
        }
    }

    let save = lexer.pos;
    if matches!(lexer.next_token(), Token::Keyword(k) if k == b"trailer") {
        if let Token::DictStart = lexer.next_token() {
            if let Object::Dict(d) = parse_dict_or_stream(lexer) {
                return d;
            }
        }
    }
    lexer.pos = save;
    Dict::new()
}

fn parse_xref_stream_section(
    lexer: &mut Lexer,
    raw: &mut HashMap<u32, RawEntry>,
) -> Result<Dict, PdfError> {
    let Some((_, Object::Stream(stream))) = parse_indirect_object(lexer) else {
        return Err(PdfError::CorruptXref(
            "expected an xref stream object at the xref offset".into(),
        ));
    };

    let widths: Vec<usize> = stream
        .dict
        .array_entry(b"W")
        .map(|w| w.iter().filter_map(|o| o.as_integer()).map(|n| n as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(PdfError::CorruptXref("xref stream /W must have 3 widths".into()));
    }

    let size = stream.dict.int_entry(b"Size").unwrap_or(0).max(0) as u32;
    let index: Vec<(u32, u32)> = stream
        .dict
        .array_entry(b"Index")
        .map(|idx| {
            idx.chunks(2)
                .filter_map(|pair| match pair {
                    [a, b] => Some((a.as_integer()? as u32, b.as_integer()? as u32)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_else(|| vec![(0, size)]);

    // Xref streams are never encrypted; decode directly through the
    // filter pipeline with no crypt hook (spec §4.3 "Scope").
    let body = pdf_filters::decode(&stream.dict, stream.data.bytes(), None)
        .map_err(|e| PdfError::CorruptXref(e.to_string()))?;

    let row_len: usize = widths.iter().sum();
    let mut cursor = 0usize;
    for (start, count) in index {
        for i in 0..count {
            if cursor + row_len > body.len() {
                break;
            }
            let row = &body[cursor..cursor + row_len];
            cursor += row_len;
            let number = start + i;

            let mut fields = [0u64; 3];
            let mut off = 0;
            for (f, w) in fields.iter_mut().zip(widths.iter()) {
                *f = be_bytes_to_u64(&row[off..off + w]);
                off += w;
            }
            // A zero-width field 0 defaults to type 1 (in-use) per spec.
            let kind = if widths[0] == 0 { 1 } else { fields[0] };

            let generation = if kind == 2 { 0 } else { fields[2] as u16 };
            raw.entry(number).or_insert(match kind {
                0 => RawKind::Free {
                    next: fields[1] as u32,
                },
                2 => RawKind::Compressed {
                    stream_num: fields[1] as u32,
                    index: fields[2] as u32,
                },
                _ => RawKind::InUse { offset: fields[1] },
            }.into_raw_entry(generation));
        }
    }

    Ok(stream.dict)
}

impl RawKind {
    fn into_raw_entry(self, generation: u16) -> RawEntry {
        RawEntry { generation, kind: self }
    }
}

fn be_bytes_to_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Parse `%PDF-1.<n>` header, tolerating up to 1024 bytes of leading junk
/// (spec §4.6 step 2, §8 boundary case).
pub fn parse_header_version(data: &[u8]) -> Option<(u8, usize)> {
    let search_end = data.len().min(1024 + 8);
    let window = &data[..search_end];
    let pos = find_first(window, b"%PDF-1.")?;
    let minor = data.get(pos + 7).copied()?;
    if minor.is_ascii_digit() {
        Some((minor - b'0', pos))
    } else {
        None
    }
}

/// Decode the `N (obj_num, offset) ...` prolog of an object stream and
/// parse each contained object (spec §4.5 step 4, §6.1 "Object stream
/// layout").
pub fn parse_object_stream_members(decoded: &[u8], n: u32, first: usize) -> Vec<(u32, Object)> {
    let mut lexer = Lexer::new(decoded);
    let mut headers = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let (Token::Integer(num), Token::Integer(off)) = (lexer.next_token(), lexer.next_token()) else {
            break;
        };
        headers.push((num as u32, off as usize));
    }

    headers
        .into_iter()
        .map(|(num, off)| {
            let mut body_lexer = Lexer::at(decoded, first + off);
            (num, parse_value(&mut body_lexer))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_integer_followed_by_reference() {
        let mut lx = Lexer::new(b"5 0 R");
        assert_eq!(parse_value(&mut lx), Object::Reference(ObjectId::new(5, 0)));
    }

    #[test]
    fn parses_plain_integer_without_reference_suffix() {
        let mut lx = Lexer::new(b"5");
        assert_eq!(parse_value(&mut lx), Object::Integer(5));
    }

    #[test]
    fn parses_array_of_mixed_values() {
        let mut lx = Lexer::new(b"[1 2.5 /Name (str) ]");
        assert_eq!(
            parse_value(&mut lx),
            Object::Array(vec![
                Object::Integer(1),
                Object::Real(2.5),
                Object::Name(b"Name".to_vec()),
                Object::StringLiteral(b"str".to_vec()),
            ])
        );
    }

    #[test]
    fn parses_dict_with_stream_and_direct_length() {
        let input = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let mut lx = Lexer::new(input);
        let obj = parse_value(&mut lx);
        let Object::Stream(s) = obj else { panic!("expected stream") };
        assert_eq!(s.data.bytes(), b"hello");
    }

    #[test]
    fn parses_dict_with_stream_and_recomputed_length() {
        let input = b"<< /Length 999 >>\nstream\nhello\nendstream";
        let mut lx = Lexer::new(input);
        let obj = parse_value(&mut lx);
        let Object::Stream(s) = obj else { panic!("expected stream") };
        assert_eq!(s.data.bytes(), b"hello");
        assert_eq!(s.dict.int_entry(b"Length"), Some(5));
    }

    #[test]
    fn parses_indirect_object() {
        let input = b"7 0 obj\n(hello)\nendobj";
        let mut lx = Lexer::new(input);
        let (id, obj) = parse_indirect_object(&mut lx).unwrap();
        assert_eq!(id, ObjectId::new(7, 0));
        assert_eq!(obj, Object::StringLiteral(b"hello".to_vec()));
    }

    #[test]
    fn parse_header_version_tolerates_leading_junk() {
        let mut junk = vec![b'x'; 100];
        junk.extend_from_slice(b"%PDF-1.4\n");
        let (minor, pos) = parse_header_version(&junk).unwrap();
        assert_eq!(minor, 4);
        assert_eq!(pos, 100);
    }

    #[test]
    fn recovers_classical_xref_and_trailer() {
        let body = b"%PDF-1.4\n1 0 obj\n(hi)\nendobj\n";
        let obj_offset = body.len() - b"1 0 obj\n(hi)\nendobj\n".len();
        let xref_offset_placeholder = 0; // filled below once we know the file layout
        let _ = xref_offset_placeholder;

        let mut file = body.to_vec();
        let xref_offset = file.len();
        file.extend_from_slice(b"xref\n0 2\n0000000000 65535 f \n");
        file.extend_from_slice(format!("{:010} 00000 n \n", obj_offset).as_bytes());
        file.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
        file.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());

        let table = recover_xref(&file).unwrap();
        assert_eq!(table.size(), 2);
        assert_eq!(table.dereference(ObjectId::new(1, 0)), Object::StringLiteral(b"hi".to_vec()));
    }
}
