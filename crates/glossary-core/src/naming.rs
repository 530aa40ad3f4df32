//! Case-insensitive comparison shared by hierarchy ordering and remote matching.

/// Folds a term identifier or name into the key used for comparisons.
pub fn fold_key(value: &str) -> String {
    value.to_lowercase()
}

/// True when two identifiers or names are equal ignoring case.
pub fn names_match(a: &str, b: &str) -> bool {
    fold_key(a) == fold_key(b)
}
