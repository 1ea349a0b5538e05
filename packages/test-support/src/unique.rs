//! Unique test data built from ULIDs so parallel tests never collide.

use ulid::Ulid;

/// A unique lowercase name usable as a coordination path segment or
/// instance name.
///
/// ```
/// use test_support::unique_name;
///
/// let name = unique_name("pm");
/// assert!(name.starts_with("pm"));
/// assert_ne!(name, unique_name("pm"));
/// ```
pub fn unique_name(prefix: &str) -> String {
    format!("{}{}", prefix, Ulid::new().to_string().to_lowercase())
}
