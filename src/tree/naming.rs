//! Sibling-unique folder identifiers of the form `name#ordinal`.

/// Separator between display name and ordinal.
pub const ORDINAL_SEPARATOR: char = '#';

/// Build the unique id for a folder at `ordinal` among its siblings.
pub fn unique_id(name: &str, ordinal: usize) -> String {
    format!("{}{}{}", name, ORDINAL_SEPARATOR, ordinal)
}

/// Split a unique id into display name and ordinal.
///
/// The split happens at the last `#`, so display names may contain `#`
/// themselves. Returns `None` when there is no separator or the suffix is not
/// a number.
pub fn split_unique_id(id: &str) -> Option<(&str, usize)> {
    let pos = id.rfind(ORDINAL_SEPARATOR)?;
    let ordinal = id[pos + 1..].parse().ok()?;
    Some((&id[..pos], ordinal))
}

/// Display-name portion of a unique id (everything before the last `#`).
///
/// Ids without a separator are returned unchanged.
pub fn display_name_of(id: &str) -> &str {
    match id.rfind(ORDINAL_SEPARATOR) {
        Some(pos) => &id[..pos],
        None => id,
    }
}

/// Replace characters that would break path addressing or the line format.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\t' | '\n' | '\r' => '_',
            other => other,
        })
        .collect()
}
