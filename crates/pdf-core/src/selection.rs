//! The page selection mini-language (spec §6.4):
//!
//! ```text
//! selection := expr ("," expr)*
//! expr      := "!"? atom | "n" atom
//! atom      := INT | "-" INT | INT "-" | INT "-" INT | "even" | "odd" | "l"
//! ```
//!
//! `!X`/`nX` deselects; clauses apply left to right with later ones
//! overriding earlier ones; out-of-range upper bounds clamp, lower bounds
//! beyond the last page are ignored.

use std::collections::BTreeSet;

use crate::error::PdfError;

/// Parse and apply a selection string against a document of `page_count`
/// pages (1-indexed), returning the resulting set of page numbers.
pub fn apply_selection(expr: &str, page_count: u32) -> Result<BTreeSet<u32>, PdfError> {
    let mut selected = BTreeSet::new();
    for clause in expr.split(',') {
        let clause = clause.trim();
        if clause.is_empty() {
            continue;
        }
        apply_clause(clause, page_count, &mut selected)?;
    }
    Ok(selected)
}

fn apply_clause(clause: &str, page_count: u32, selected: &mut BTreeSet<u32>) -> Result<(), PdfError> {
    let (deselect, atom) = if let Some(rest) = clause.strip_prefix('!') {
        (true, rest)
    } else if let Some(rest) = clause.strip_prefix('n') {
        (true, rest)
    } else {
        (false, clause)
    };

    let pages = resolve_atom(atom, page_count)?;
    for page in pages {
        if deselect {
            selected.remove(&page);
        } else {
            selected.insert(page);
        }
    }
    Ok(())
}

fn resolve_atom(atom: &str, page_count: u32) -> Result<Vec<u32>, PdfError> {
    match atom {
        "even" => Ok((1..=page_count).filter(|p| p % 2 == 0).collect()),
        "odd" => Ok((1..=page_count).filter(|p| p % 2 == 1).collect()),
        "l" => Ok(if page_count == 0 { vec![] } else { vec![page_count] }),
        _ => resolve_numeric_atom(atom, page_count),
    }
}

fn resolve_numeric_atom(atom: &str, page_count: u32) -> Result<Vec<u32>, PdfError> {
    if let Some(upper) = atom.strip_prefix('-') {
        let upper: u32 = parse_int(upper)?;
        let upper = upper.min(page_count);
        return Ok((1..=upper).collect());
    }
    if let Some((lower, upper)) = atom.split_once('-') {
        // "last" is accepted as an alias for an open upper bound (spec §8:
        // "PageSelection `1-last` resolves to the full page set regardless
        // of document length"), alongside the grammar's bare `INT-` form.
        if upper.is_empty() || upper == "last" {
            let lower: u32 = parse_int(lower)?;
            if lower > page_count {
                return Ok(vec![]);
            }
            return Ok((lower..=page_count).collect());
        }
        let lower: u32 = parse_int(lower)?;
        let upper: u32 = parse_int(upper)?;
        if lower > page_count {
            return Ok(vec![]);
        }
        let upper = upper.min(page_count);
        if lower > upper {
            return Ok(vec![]);
        }
        return Ok((lower..=upper).collect());
    }
    let n: u32 = parse_int(atom)?;
    if n > page_count {
        return Ok(vec![]);
    }
    Ok(vec![n])
}

fn parse_int(text: &str) -> Result<u32, PdfError> {
    text.parse::<u32>().map_err(|_| PdfError::InvalidValue {
        entry: "PageSelection".into(),
        reason: format!("{text:?} is not an integer"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_range_and_deselect() {
        let sel = apply_selection("-3,5,!2", 6).unwrap();
        assert_eq!(sel, BTreeSet::from([1, 3, 5]));
    }

    #[test]
    fn full_range_resolves_regardless_of_last_page_value() {
        let sel = apply_selection("1-last", 3).unwrap();
        assert_eq!(sel, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn open_ended_range_and_last_page_marker() {
        let sel = apply_selection("3-,l", 5).unwrap();
        assert_eq!(sel, BTreeSet::from([3, 4, 5]));
    }

    #[test]
    fn even_and_odd_selectors() {
        assert_eq!(apply_selection("even", 5).unwrap(), BTreeSet::from([2, 4]));
        assert_eq!(apply_selection("odd", 5).unwrap(), BTreeSet::from([1, 3, 5]));
    }

    #[test]
    fn lower_bound_beyond_last_page_is_ignored() {
        assert_eq!(apply_selection("10-20", 5).unwrap(), BTreeSet::new());
    }

    #[test]
    fn later_clause_overrides_earlier_one() {
        let sel = apply_selection("1-5,!3", 5).unwrap();
        assert_eq!(sel, BTreeSet::from([1, 2, 4, 5]));
    }
}
