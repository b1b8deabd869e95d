//! Filename slugs.

/// Slugify a display name into a filesystem- and Windows-safe token.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters collapses to a single `-`. Leading/trailing dashes are
/// trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Truncate a slug at a character boundary.
pub fn truncate(slug: &str, max: usize) -> String {
    slug.chars().take(max).collect()
}
