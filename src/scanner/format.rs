/// Format tokens that mark a listing as vinyl. Discogs mixes straight and
/// typographic quotes in format descriptions, so both spellings are listed.
const VINYL_INDICATORS: &[&str] = &[
    "vinyl", "lp", "12\"", "10\"", "7\"", "12\u{201d}", "10\u{201d}", "7\u{201d}",
];

/// True if any token case-insensitively matches a vinyl indicator. Other
/// tokens present ("Box Set", "Limited Edition", ...) never override a
/// positive indicator — a vinyl box set is still vinyl.
pub fn is_vinyl<S: AsRef<str>>(tokens: &[S]) -> bool {
    tokens.iter().any(|t| {
        let t = t.as_ref().trim();
        VINYL_INDICATORS.iter().any(|ind| t.eq_ignore_ascii_case(ind))
    })
}
