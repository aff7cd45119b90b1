/// Identifiers that may not name a declaration or port. Compared without
/// regard to case.
pub const RESERVED_NAMES: &[&str] =
    &["_", "intrinsic", "namespace", "struct", "constraint", "return"];

/// Name of the member holding the result of a function with a scope body.
pub const RETURN: &str = "return";
