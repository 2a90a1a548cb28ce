use crate::{Result, SketchbookError};
use chrono::NaiveDate;

pub const UNTITLED_SKETCH_ID: &str = "Untitled";

/// Java class names cannot start with a digit, and the sketch id doubles as one.
pub const DIGIT_LEADING_PREFIX: &str = "S_";

pub const VARIANT_ID_PREFIX: char = 'v';

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Maps a user-provided name onto `[A-Za-z0-9_]` plus CJK ideographs, prefixing
/// digit-leading results with `S_`. May return an empty string.
///
/// Each disallowed char becomes one `_` per UTF-16 unit, so characters outside
/// the BMP (emoji) turn into `__`.
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if is_name_char(c) {
            out.push(c);
        } else {
            out.extend(std::iter::repeat('_').take(c.len_utf16()));
        }
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, DIGIT_LEADING_PREFIX);
    }
    out
}

#[must_use]
pub fn sketch_id_for_create(raw: &str) -> String {
    let id = sanitize_name(raw);
    if id.is_empty() {
        UNTITLED_SKETCH_ID.to_string()
    } else {
        id
    }
}

pub fn sketch_id_for_rename(raw: &str) -> Result<String> {
    let id = sanitize_name(raw);
    if id.is_empty() {
        return Err(SketchbookError::InvalidName(format!(
            "'{raw}' has no usable characters"
        )));
    }
    Ok(id)
}

/// `S_<YYYYMMDD>_<n>` with the smallest `n >= 1` not already taken.
pub fn auto_sketch_id(date: NaiveDate, is_taken: impl Fn(&str) -> bool) -> String {
    let stamp = date.format("%Y%m%d");
    let mut seq = 1u32;
    loop {
        let candidate = format!("{DIGIT_LEADING_PREFIX}{stamp}_{seq}");
        if !is_taken(&candidate) {
            return candidate;
        }
        seq = seq.saturating_add(1);
    }
}

/// Ids arriving from callers must name exactly one entry inside the sketchbook.
pub fn validate_id(kind: &str, id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.contains(':');
    if bad {
        return Err(SketchbookError::InvalidName(format!("invalid {kind} id '{id}'")));
    }
    Ok(())
}

#[must_use]
pub fn variant_id(seq: u64) -> String {
    format!("{VARIANT_ID_PREFIX}{seq}")
}

#[must_use]
pub fn variant_seq(id: &str) -> Option<u64> {
    id.strip_prefix(VARIANT_ID_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_replaces_disallowed_chars() {
        assert_eq!(sanitize_name("My Sketch!"), "My_Sketch_");
        assert_eq!(sanitize_name("草图 one"), "草图_one");
        assert_eq!(sanitize_name("héllo"), "h_llo");
    }

    #[test]
    fn chars_outside_the_bmp_take_two_underscores() {
        assert_eq!(sanitize_name("a😀"), "a__");
        assert_eq!(sketch_id_for_create("😀 art"), "___art");
    }

    #[test]
    fn digit_leading_names_get_prefixed_after_sanitizing() {
        assert_eq!(sketch_id_for_create("1 Test"), "S_1_Test");
        assert_eq!(sketch_id_for_create("_1"), "_1");
    }

    #[test]
    fn empty_names_default_on_create_and_fail_on_rename() {
        assert_eq!(sketch_id_for_create(""), UNTITLED_SKETCH_ID);
        assert!(matches!(
            sketch_id_for_rename(""),
            Err(SketchbookError::InvalidName(_))
        ));
        assert_eq!(sketch_id_for_rename("  ").expect("underscores"), "__");
    }

    #[test]
    fn auto_id_skips_taken_sequence_numbers() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let taken = ["S_20261019_1", "S_20261019_2"];
        let id = auto_sketch_id(date, |candidate| taken.contains(&candidate));
        assert_eq!(id, "S_20261019_3");
    }

    #[test]
    fn ids_cannot_escape_the_sketchbook() {
        for bad in ["", "..", "../x", "a/b", "a\\b", ".variants", "c:x"] {
            assert!(validate_id("sketch", bad).is_err(), "{bad} should be rejected");
        }
        validate_id("sketch", "Waves_2").expect("plain id");
    }

    #[test]
    fn variant_ids_round_trip_sequence() {
        assert_eq!(variant_id(7), "v7");
        assert_eq!(variant_seq("v12"), Some(12));
        assert_eq!(variant_seq("x12"), None);
        assert_eq!(variant_seq("v"), None);
    }
}
