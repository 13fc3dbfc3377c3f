use crate::dict::Dict;
use crate::escape::{escape, hex_encode};
use crate::reference::ObjectId;
use crate::stream::Stream;

/// A PDF name's value: the bytes after the `#hh`-escapes have been
/// resolved. Names are byte strings, not Unicode (spec §3.1 invariant).
pub type Name = Vec<u8>;

/// Every value a PDF object can take (spec §3.1).
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    StringLiteral(Vec<u8>),
    HexLiteral(Vec<u8>),
    Array(Vec<Object>),
    Dict(Dict),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Object::Dict(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(n) => Some(*n),
            Object::Real(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(n) => Some(*n as f64),
            Object::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// `/Type` of this value, if it has a dict with one.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.as_dict().and_then(|d| d.type_name())
    }

    /// `/Subtype` of this value, if it has a dict with one.
    pub fn subtype_name(&self) -> Option<&[u8]> {
        self.as_dict().and_then(|d| d.subtype_name())
    }

    pub fn is_objstm(&self) -> bool {
        self.as_dict().map(|d| d.is_objstm()).unwrap_or(false)
    }

    pub fn is_linearization_param_dict(&self) -> bool {
        self.as_dict()
            .map(|d| d.is_linearization_param_dict())
            .unwrap_or(false)
    }

    /// Serialize this object into the bytes that appear in a PDF body.
    /// Dict keys are emitted in the `Dict`'s own (alphabetical) order; `Null`
    /// entries inside arrays/dicts serialize as the literal `null` (spec
    /// §4.1).
    pub fn to_pdf_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_pdf_bytes(&mut out);
        out
    }

    fn write_pdf_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(true) => out.extend_from_slice(b"true"),
            Object::Boolean(false) => out.extend_from_slice(b"false"),
            Object::Integer(n) => out.extend_from_slice(n.to_string().as_bytes()),
            Object::Real(f) => out.extend_from_slice(format_pdf_real(*f).as_bytes()),
            Object::Name(n) => {
                out.push(b'/');
                write_escaped_name(n, out);
            }
            Object::StringLiteral(s) => {
                out.push(b'(');
                out.extend_from_slice(&escape(s));
                out.push(b')');
            }
            Object::HexLiteral(s) => {
                out.push(b'<');
                out.extend_from_slice(&hex_encode(s));
                out.push(b'>');
            }
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_pdf_bytes(out);
                }
                out.push(b']');
            }
            Object::Dict(d) => write_dict_bytes(d, out),
            Object::Stream(s) => {
                write_dict_bytes(&s.dict, out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(s.data.bytes());
                out.extend_from_slice(b"\nendstream");
            }
            Object::Reference(id) => {
                out.extend_from_slice(format!("{} {} R", id.number, id.generation).as_bytes());
            }
        }
    }
}

fn write_dict_bytes(dict: &Dict, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b'/');
        write_escaped_name(key, out);
        out.push(b' ');
        value.write_pdf_bytes(out);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

fn write_escaped_name(name: &[u8], out: &mut Vec<u8>) {
    for &b in name {
        let is_regular = !matches!(b, b'\0'..=b' ' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#')
            && b < 0x80;
        if is_regular {
            out.push(b);
        } else {
            out.push(b'#');
            out.extend_from_slice(format!("{:02X}", b).as_bytes());
        }
    }
}

/// PDF reals are fixed-precision, never in exponential notation.
fn format_pdf_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        let mut s = format!("{:.6}", value);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.push('0');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_null_inside_array() {
        let arr = Object::Array(vec![Object::Null, Object::Integer(1)]);
        assert_eq!(arr.to_pdf_bytes(), b"[null 1]");
    }

    #[test]
    fn serializes_dict_alphabetically() {
        let mut d = Dict::new();
        d.set(b"Z".to_vec(), Object::Integer(1));
        d.set(b"A".to_vec(), Object::Integer(2));
        let bytes = Object::Dict(d).to_pdf_bytes();
        assert_eq!(bytes, b"<</A 2 /Z 1 >>");
    }

    #[test]
    fn escapes_name_special_chars() {
        let name = Object::Name(b"A Name#".to_vec());
        assert_eq!(name.to_pdf_bytes(), b"/A#20Name#23");
    }

    #[test]
    fn formats_integral_reals_without_decimal() {
        assert_eq!(format_pdf_real(12.0), "12");
        assert_eq!(format_pdf_real(12.5), "12.5");
    }

    #[test]
    fn reference_serializes_as_r() {
        let r = Object::Reference(ObjectId::new(5, 2));
        assert_eq!(r.to_pdf_bytes(), b"5 2 R");
    }
}
