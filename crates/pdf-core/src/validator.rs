//! The validator (spec §4.7): one validator per top-level catalog entry,
//! parameterized by `(required, since_version, predicate)`, plus the
//! relaxed-mode overrides and repairs spec §4.7 enumerates.

use pdf_object::{Dict, Object};
use tracing::warn;

use crate::config::ValidationMode;
use crate::error::PdfError;
use crate::xref::{EntryKind, XRefTable};

#[derive(Debug, Clone)]
pub struct CatalogEntrySpec {
    pub key: &'static [u8],
    pub required: bool,
    pub since_version: u8,
}

/// The well-known top-level catalog entries this validator knows about
/// (spec §4.7: "PageLabels, Outlines, StructTreeRoot, Names, AcroForm,
/// etc.").
pub const CATALOG_ENTRIES: &[CatalogEntrySpec] = &[
    CatalogEntrySpec { key: b"Pages", required: true, since_version: 0 },
    CatalogEntrySpec { key: b"PageLabels", required: false, since_version: 3 },
    CatalogEntrySpec { key: b"Outlines", required: false, since_version: 0 },
    CatalogEntrySpec { key: b"StructTreeRoot", required: false, since_version: 3 },
    CatalogEntrySpec { key: b"Names", required: false, since_version: 2 },
    CatalogEntrySpec { key: b"AcroForm", required: false, since_version: 2 },
];

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
    pub page_count: u32,
}

/// Validate the catalog against `CATALOG_ENTRIES`, applying the mode's
/// rules (spec §4.7). Returns accumulated warnings on success; a strict
/// failure returns `Err` immediately.
pub fn validate_catalog(
    xref: &mut XRefTable,
    catalog: &Dict,
    file_version: u8,
    mode: ValidationMode,
) -> Result<ValidationReport, PdfError> {
    let mut report = ValidationReport::default();

    for spec in CATALOG_ENTRIES {
        let present = catalog.contains_key(spec.key);
        if spec.required && !present {
            return Err(PdfError::MissingRequired {
                context: "Catalog".into(),
                entry: String::from_utf8_lossy(spec.key).into_owned(),
            });
        }
        if !present {
            continue;
        }
        if spec.since_version > file_version {
            let msg = format!(
                "`{}` requires PDF 1.{} but file is 1.{}",
                String::from_utf8_lossy(spec.key),
                spec.since_version,
                file_version
            );
            match mode {
                ValidationMode::Strict => {
                    return Err(PdfError::VersionTooLow {
                        feature: String::from_utf8_lossy(spec.key).into_owned(),
                        required: format!("1.{}", spec.since_version),
                        actual: format!("1.{}", file_version),
                    })
                }
                ValidationMode::Relaxed => {
                    warn!("{msg}");
                    report.warnings.push(msg);
                }
                ValidationMode::None => {}
            }
        }
    }

    validate_well_known_shapes(xref, catalog, mode, &mut report)?;
    mark_visited_streams(xref);

    Ok(report)
}

fn validate_well_known_shapes(
    xref: &XRefTable,
    catalog: &Dict,
    mode: ValidationMode,
    report: &mut ValidationReport,
) -> Result<(), PdfError> {
    if mode == ValidationMode::None {
        return Ok(());
    }

    if let Some(names) = catalog.get(b"Names").and_then(|o| xref.dereference_dict(o)) {
        if let Some(parent_tree) = names.get(b"ParentTree").and_then(|o| xref.dereference_dict(o)) {
            let nums_empty = parent_tree
                .array_entry(b"Nums")
                .map(|n| n.is_empty())
                .unwrap_or(true);
            if nums_empty && mode != ValidationMode::Relaxed {
                return Err(PdfError::InvalidValue {
                    entry: "Names/ParentTree".into(),
                    reason: "empty number tree".into(),
                });
            }
        }
    }

    if let Some(info) = catalog.get(b"Metadata").and_then(|o| xref.dereference_dict(o)) {
        let _ = info; // shape-only check: presence is enough at this layer.
    }

    let _ = report;
    Ok(())
}

/// Mark every stream entry as `valid` once visited, so revisiting a
/// shared stream (e.g. through two pages' Resources) or a structure-tree
/// cycle stops at the second encounter (spec §4.7).
fn mark_visited_streams(xref: &mut XRefTable) {
    for number in 0..xref.size() {
        if let Some(entry) = xref.find_mut(number) {
            if entry.kind == EntryKind::InUse && matches!(entry.object, Some(Object::Stream(_))) {
                entry.valid = true;
            }
        }
    }
}

/// Accept a `DateString` even when it doesn't exactly match
/// `D:YYYYMMDDHHMMSS+HH'MM'` in relaxed mode (spec §4.7); strict mode
/// requires the full canonical form.
pub fn validate_date_string(value: &[u8], mode: ValidationMode) -> Result<(), PdfError> {
    if is_canonical_date(value) {
        return Ok(());
    }
    match mode {
        ValidationMode::Strict => Err(PdfError::InvalidValue {
            entry: "DateString".into(),
            reason: format!("{:?} is not D:YYYYMMDDHHMMSS+HH'MM'", String::from_utf8_lossy(value)),
        }),
        _ => Ok(()),
    }
}

fn is_canonical_date(value: &[u8]) -> bool {
    // "D:" + 14 digits + sign + 2 digits + "'" + 2 digits + "'"
    if value.len() != 23 || !value.starts_with(b"D:") {
        return false;
    }
    let digits_ok = value[2..16].iter().all(u8::is_ascii_digit);
    let sign_ok = matches!(value[16], b'+' | b'-' | b'Z');
    digits_ok && sign_ok
}

/// Snap a `Rotate` value not a multiple of 90 to the nearest multiple
/// (spec §4.7 relaxed-mode override).
pub fn snap_rotate(value: i64, mode: ValidationMode) -> Result<i64, PdfError> {
    if value % 90 == 0 {
        return Ok(value);
    }
    match mode {
        ValidationMode::Strict => Err(PdfError::InvalidValue {
            entry: "Rotate".into(),
            reason: format!("{value} is not a multiple of 90"),
        }),
        _ => Ok(((value as f64 / 90.0).round() as i64) * 90),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog_with_pages() -> Dict {
        let mut d = Dict::new();
        d.set(b"Pages".to_vec(), Object::Reference(pdf_object::ObjectId::new(2, 0)));
        d
    }

    #[test]
    fn missing_required_pages_fails_in_any_mode() {
        let mut xref = XRefTable::new();
        let empty = Dict::new();
        let err = validate_catalog(&mut xref, &empty, 7, ValidationMode::Strict).unwrap_err();
        assert!(matches!(err, PdfError::MissingRequired { .. }));
    }

    #[test]
    fn version_too_low_is_fatal_in_strict_but_a_warning_in_relaxed() {
        let mut xref = XRefTable::new();
        let mut catalog = catalog_with_pages();
        catalog.set(b"AcroForm".to_vec(), Object::Reference(pdf_object::ObjectId::new(3, 0)));

        let strict_err = validate_catalog(&mut xref, &catalog, 1, ValidationMode::Strict).unwrap_err();
        assert!(matches!(strict_err, PdfError::VersionTooLow { .. }));

        let relaxed = validate_catalog(&mut xref, &catalog, 1, ValidationMode::Relaxed).unwrap();
        assert_eq!(relaxed.warnings.len(), 1);
    }

    #[test]
    fn canonical_date_string_is_recognized() {
        assert!(is_canonical_date(b"D:20240101120000+00'00'"));
        assert!(!is_canonical_date(b"2024-01-01"));
    }

    #[test]
    fn snap_rotate_rounds_to_nearest_multiple_of_90_in_relaxed_mode() {
        assert_eq!(snap_rotate(91, ValidationMode::Relaxed).unwrap(), 90);
        assert_eq!(snap_rotate(91, ValidationMode::Strict).unwrap_err().to_string().contains("90"), true);
    }
}
