/// Case-insensitive comparison used wherever configuration names are matched
/// against runtime state (trigger states, mapping names, statuses).
pub fn equal_fold(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}
