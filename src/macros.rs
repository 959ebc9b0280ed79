/// Compile a literal regex once and hand out a `&'static Regex`.
///
/// Only for literal patterns known to be valid; runtime patterns (override
/// rules, code globs) go through `Regex::new` and report their errors.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect("literal regex"));
        &*RE
    }};
}

/// Return early with a formatted [`crate::Error::Config`].
macro_rules! bail_config {
    ($($arg:tt)*) => {
        return Err($crate::Error::config(format!($($arg)*)))
    };
}

/// Return early with a formatted [`crate::Error::Pattern`].
macro_rules! bail_pattern {
    ($($arg:tt)*) => {
        return Err($crate::Error::pattern(format!($($arg)*)))
    };
}
