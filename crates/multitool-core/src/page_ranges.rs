//! Page range parsing for PDF split and text extraction
//!
//! Converts human-entered strings such as `"1-3,5,7-"` into zero-based page
//! indices. Range endpoints past the last page are clamped, while a bare page
//! number past the last page is rejected.

use std::collections::HashSet;

use crate::error::ToolError;

/// Parse a page range string into unique zero-based indices, in the order
/// they first appear.
///
/// An absent or blank string selects every page.
///
/// # Examples
/// ```
/// use multitool_core::page_ranges::parse_page_ranges;
///
/// assert_eq!(parse_page_ranges(Some("3,1-3"), 5).unwrap(), vec![2, 0, 1]);
/// assert_eq!(parse_page_ranges(Some("2-100"), 5).unwrap(), vec![1, 2, 3, 4]);
/// assert_eq!(parse_page_ranges(Some("4-"), 5).unwrap(), vec![3, 4]);
/// assert!(parse_page_ranges(Some("100"), 5).is_err());
/// ```
pub fn parse_page_ranges(pages: Option<&str>, total_pages: usize) -> Result<Vec<usize>, ToolError> {
    let input = match pages.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Ok((0..total_pages).collect()),
    };

    let total = total_pages as i64;
    let mut indices: Vec<usize> = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start_str, end_str)) = part.split_once('-') {
            // Range like "2-4", "-3" or "7-"
            let start = match start_str.trim() {
                "" => 0,
                s => parse_page_number(s, "Invalid page start")?,
            };
            let end = match end_str.trim() {
                "" => total - 1,
                s => parse_page_number(s, "Invalid page end")?,
            };

            if start < 0 || end < 0 || start > end {
                return Err(ToolError::InvalidRange(format!("Invalid range: {}", part)));
            }

            let last = end.min(total - 1);
            indices.extend((start..=last).map(|i| i as usize));
        } else {
            // Single page like "5"
            let index = parse_page_number(part, "Invalid page number")?;
            if index < 0 || index >= total {
                return Err(ToolError::InvalidRange(format!(
                    "Page out of bounds: {}",
                    part
                )));
            }
            indices.push(index as usize);
        }
    }

    let mut seen = HashSet::new();
    indices.retain(|i| seen.insert(*i));
    Ok(indices)
}

/// Parse a 1-based page number into a zero-based index. May be negative.
fn parse_page_number(token: &str, context: &str) -> Result<i64, ToolError> {
    token
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| ToolError::InvalidRange(format!("{}: {}", context, token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_empty_selects_all() {
        assert_eq!(parse_page_ranges(None, 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_page_ranges(Some(""), 10).unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(parse_page_ranges(Some("   "), 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_parse_singles() {
        assert_eq!(parse_page_ranges(Some("1,2,3"), 10).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_keeps_first_occurrence() {
        assert_eq!(parse_page_ranges(Some("3,1-3"), 5).unwrap(), vec![2, 0, 1]);
        assert_eq!(parse_page_ranges(Some("2, 2, 1"), 5).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_parse_range_end_is_clamped() {
        assert_eq!(parse_page_ranges(Some("2-100"), 5).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_open_ranges() {
        assert_eq!(parse_page_ranges(Some("-2"), 5).unwrap(), vec![0, 1]);
        assert_eq!(parse_page_ranges(Some("4-"), 5).unwrap(), vec![3, 4]);
        assert_eq!(
            parse_page_ranges(Some("1-3,5,7-"), 8).unwrap(),
            vec![0, 1, 2, 4, 6, 7]
        );
    }

    #[test]
    fn test_parse_range_starting_past_end_is_empty() {
        assert_eq!(parse_page_ranges(Some("7-9"), 5).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_bare_page_out_of_bounds_fails() {
        let err = parse_page_ranges(Some("100"), 5).unwrap_err();
        assert!(matches!(err, ToolError::InvalidRange(ref msg) if msg.contains("100")));
        assert!(parse_page_ranges(Some("0"), 5).is_err());
    }

    #[test]
    fn test_parse_reversed_range_fails() {
        let err = parse_page_ranges(Some("5-2"), 10).unwrap_err();
        assert!(matches!(err, ToolError::InvalidRange(ref msg) if msg.contains("5-2")));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_page_ranges(Some("abc"), 5).is_err());
        assert!(parse_page_ranges(Some("1-x"), 5).is_err());
        assert!(parse_page_ranges(Some("0-3"), 5).is_err());
    }

    #[test]
    fn test_parse_extreme_numbers_fail_cleanly() {
        let min = i64::MIN.to_string();
        for spec in [
            format!("1-{}", min),
            format!("{}-2", min),
            min.clone(),
        ] {
            let err = parse_page_ranges(Some(&spec), 5).unwrap_err();
            assert!(matches!(err, ToolError::InvalidRange(_)), "{}: {:?}", spec, err);
        }
        assert!(parse_page_ranges(Some(&i64::MAX.to_string()), 5).is_err());
        assert_eq!(
            parse_page_ranges(Some(&format!("4-{}", i64::MAX)), 5).unwrap(),
            vec![3, 4]
        );
    }

    #[test]
    fn test_parse_skips_empty_tokens() {
        assert_eq!(parse_page_ranges(Some(",1,,2,"), 5).unwrap(), vec![0, 1]);
    }

    proptest! {
        #[test]
        fn parsed_indices_are_unique_and_in_bounds(
            total in 1usize..50,
            tokens in prop::collection::vec((1usize..60, 0usize..10), 1..8)
        ) {
            let spec = tokens
                .iter()
                .map(|(start, len)| format!("{}-{}", start, start + len))
                .collect::<Vec<_>>()
                .join(",");
            let parsed = parse_page_ranges(Some(&spec), total).unwrap();

            let unique: HashSet<_> = parsed.iter().collect();
            prop_assert_eq!(unique.len(), parsed.len());
            prop_assert!(parsed.iter().all(|&i| i < total));
        }

        #[test]
        fn parsing_is_idempotent_on_its_output(
            total in 1usize..40,
            picks in prop::collection::vec(1usize..40, 0..10)
        ) {
            let spec = picks
                .iter()
                .filter(|&&p| p <= total)
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let first = parse_page_ranges(Some(&spec), total).unwrap();
            let rendered = first
                .iter()
                .map(|i| (i + 1).to_string())
                .collect::<Vec<_>>()
                .join(",");
            let second = parse_page_ranges(Some(&rendered), total).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
