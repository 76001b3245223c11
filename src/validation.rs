//! Input rules shared by the request payloads. Each function either returns the
//! normalized value or a `Validation` error naming the offending field.

use crate::error::AppError;

pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 128;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 30;
pub const MAX_EXCERPT_LEN: usize = 300;
pub const DERIVED_EXCERPT_LEN: usize = 200;
pub const MAX_COMMENT_LEN: usize = 2000;
pub const MAX_BLOG_CONTENT_LEN: usize = 100_000;

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn bounded(field: &str, value: &str, min: usize, max: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    let len = char_len(trimmed);
    if len < min || len > max {
        return Err(AppError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trims and lowercases an email address and checks its basic shape.
pub fn email(value: &str) -> Result<String, AppError> {
    let normalized = value.trim().to_lowercase();
    let invalid = || AppError::validation("email is not a valid address");

    if normalized.len() > 254 || normalized.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = normalized.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let dot = domain.find('.').ok_or_else(invalid)?;
    if dot == 0 || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(normalized)
}

pub fn name(value: &str) -> Result<String, AppError> {
    bounded("name", value, 2, 60)
}

/// Password policy: length bounds plus at least one letter and one digit.
pub fn password(value: &str) -> Result<(), AppError> {
    let len = char_len(value);
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "password must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        )));
    }
    let has_letter = value.chars().any(char::is_alphabetic);
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(AppError::validation(
            "password must contain at least one letter and one digit",
        ));
    }
    Ok(())
}

pub fn bio(value: &str) -> Result<String, AppError> {
    bounded("bio", value, 0, 1000)
}

pub fn blog_title(value: &str) -> Result<String, AppError> {
    bounded("title", value, 3, 200)
}

pub fn blog_content(value: &str) -> Result<String, AppError> {
    bounded("content", value, 1, MAX_BLOG_CONTENT_LEN)
}

pub fn excerpt(value: &str) -> Result<String, AppError> {
    bounded("excerpt", value, 1, MAX_EXCERPT_LEN)
}

/// Builds an excerpt from the post body: whitespace collapsed, cut on a char boundary.
pub fn derive_excerpt(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if char_len(&collapsed) <= DERIVED_EXCERPT_LEN {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(DERIVED_EXCERPT_LEN).collect();
    format!("{}...", cut.trim_end())
}

/// Lowercases, trims and deduplicates tags, preserving first-seen order.
pub fn tags(values: &[String]) -> Result<Vec<String>, AppError> {
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for raw in values {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() || char_len(&tag) > MAX_TAG_LEN {
            return Err(AppError::validation(format!(
                "tags must be between 1 and {MAX_TAG_LEN} characters"
            )));
        }
        if !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    if normalized.len() > MAX_TAGS {
        return Err(AppError::validation(format!(
            "a post can have at most {MAX_TAGS} tags"
        )));
    }
    Ok(normalized)
}

pub fn comment(value: &str) -> Result<String, AppError> {
    bounded("comment", value, 1, MAX_COMMENT_LEN)
}

pub fn motivation(value: &str) -> Result<String, AppError> {
    bounded("motivation", value, 20, 2000)
}

pub fn url(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://"))
        || trimmed.chars().any(char::is_whitespace)
        || trimmed.len() > 2048
    {
        return Err(AppError::validation(format!("{field} must be an http(s) URL")));
    }
    Ok(trimmed.to_string())
}

pub fn reason(value: Option<&str>) -> Result<Option<String>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => bounded("reason", text, 1, 500).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(email("  Jane.Doe@Example.COM ").unwrap(), "jane.doe@example.com");
    }

    #[test]
    fn email_rejects_malformed_addresses() {
        for bad in ["", "plain", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@.com", "a@b."] {
            assert!(email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn password_policy() {
        assert!(password("abcdefg1").is_ok());
        assert!(password("short1").is_err());
        assert!(password("onlyletters").is_err());
        assert!(password("12345678").is_err());
        assert!(password(&"a1".repeat(65)).is_err());
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let input = vec!["Rust".to_string(), " rust ".to_string(), "Web".to_string()];
        assert_eq!(tags(&input).unwrap(), vec!["rust", "web"]);
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let input: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
        assert!(tags(&input).is_err());
    }

    #[test]
    fn derived_excerpt_collapses_whitespace_and_truncates() {
        assert_eq!(derive_excerpt("hello \n\n  world"), "hello world");
        let long = "word ".repeat(100);
        let excerpt = derive_excerpt(&long);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= DERIVED_EXCERPT_LEN + 3);
    }

    #[test]
    fn empty_reason_is_none() {
        assert_eq!(reason(Some("   ")).unwrap(), None);
        assert_eq!(reason(Some(" spam ")).unwrap(), Some("spam".to_string()));
    }
}
