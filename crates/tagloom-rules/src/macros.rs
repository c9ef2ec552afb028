/// Compile a literal pattern once, on first use.
///
/// Evaluates to `Option<&'static Regex>`; `None` only if the literal is not a
/// valid pattern.
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<Option<regex::Regex>> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).ok());
        RE.as_ref()
    }};
}
