//! Identifier case conversion: config field names are camelCase or snake_case, DB columns are snake_case.

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_at" -> "createdAt".
/// An underscore before a character without an uppercase form stays ("address_2").
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            if !c.is_lowercase() {
                out.push('_');
            }
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdAt" -> "created_at".
/// An underscore is only inserted where a lowercase letter or digit is followed by an uppercase letter,
/// so acronyms stay together ("HTTPServer" -> "httpserver").
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// True when the identifier contains any uppercase character.
pub fn is_camel_case(s: &str) -> bool {
    s.chars().any(char::is_uppercase)
}

/// camelCase -> snake_case and snake_case -> camelCase.
pub fn invert_case_style(s: &str) -> String {
    if is_camel_case(s) {
        to_snake_case(s)
    } else {
        to_camel_case(s)
    }
}
