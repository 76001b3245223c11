use rand::{Rng, distr::Alphanumeric};

const SUFFIX_LEN: usize = 6;
const MAX_BASE_LEN: usize = 80;

/// Lowercase ASCII words joined by single hyphens. Falls back to `post` when
/// the title has no ASCII alphanumerics.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let mut slug = slug.trim_end_matches('-').to_string();
    if slug.len() > MAX_BASE_LEN {
        slug.truncate(MAX_BASE_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug.push_str("post");
    }
    slug
}

/// A unique slug for a new post: `slugify(title)` plus a random suffix.
pub fn unique_slug(title: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{suffix}", slugify(title))
}
