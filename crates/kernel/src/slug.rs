//! Canonical key derivation.

/// Width of the `slug` columns.
pub const MAX_SLUG_LEN: usize = 50;

/// Derive a canonical key from a display name.
///
/// Lowercases, keeps ASCII alphanumerics, turns every other run of
/// characters into one hyphen and trims hyphens at both ends. Keys longer than
/// [`MAX_SLUG_LEN`] are cut back to the last whole word that fits.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }

    // Only ASCII remains, so every index is a char boundary.
    if slug.as_bytes()[MAX_SLUG_LEN] == b'-' {
        slug.truncate(MAX_SLUG_LEN);
        return slug;
    }
    let cut = slug[..MAX_SLUG_LEN].rfind('-').unwrap_or(MAX_SLUG_LEN);
    slug.truncate(cut);
    slug
}

/// Whether `key` is already in canonical form and fits a `slug` column.
pub fn is_canonical(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_SLUG_LEN && slugify(key) == key
}
