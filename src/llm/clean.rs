//! Model output cleaning
//!
//! Strips the surface formatting models wrap SQL in. Only the `SQLQuery:`
//! label at the very start and Markdown fence markers are removed; all other
//! text is left as-is. Stages repeat until nothing changes, so
//! `clean(clean(x)) == clean(x)`.

const LABEL: &str = "SQLQuery:";

/// Remove a leading `SQLQuery:` label and the whitespace after it
pub fn strip_label(text: &str) -> &str {
    match text.strip_prefix(LABEL) {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

/// Remove every "```sql" and "```" marker.
///
/// `sql` only counts as a language tag when whitespace or the end of the
/// text follows it.
pub fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        if is_sql_tag(rest) {
            rest = &rest[3..];
        }
    }
    out.push_str(rest);
    out
}

fn is_sql_tag(text: &str) -> bool {
    let Some(tag) = text.get(..3) else {
        return false;
    };
    tag.eq_ignore_ascii_case("sql") && text[3..].chars().next().is_none_or(char::is_whitespace)
}

/// Full cleaning pipeline: label-strip, fence-strip, trim, until stable
pub fn clean(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = strip_fences(strip_label(&current)).trim().to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}
