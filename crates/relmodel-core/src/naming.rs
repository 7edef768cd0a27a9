//! Identifier casing for inferred key names.

use heck::ToSnakeCase;

/// Convert a type or field identifier to `snake_case`.
///
/// ```
/// use relmodel_core::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("UserProfile"), "user_profile");
/// assert_eq!(to_snake_case("HTTPRequest"), "http_request");
/// ```
pub fn to_snake_case(ident: &str) -> String {
    ident.to_snake_case()
}

/// Default join key for a model: `snake_case(name) + suffix`.
pub fn key_name(model: &str, suffix: &str) -> String {
    let mut key = to_snake_case(model);
    key.push_str(suffix);
    key
}
