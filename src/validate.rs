//! Image reference validation.
//!
//! The model fetches whatever URL it is handed, so only references inside the
//! operator's own storage namespace may ever reach it. The check is a plain
//! prefix comparison: no parsing, no DNS, no redirects.

/// Returns true only if `image_url` starts with exactly `trusted_prefix`.
///
/// An empty prefix trusts nothing.
pub fn is_trusted_image_url(image_url: &str, trusted_prefix: &str) -> bool {
    !trusted_prefix.is_empty() && image_url.starts_with(trusted_prefix)
}
