use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Returns `candidate` if it is not taken yet, otherwise the first free name
/// out of `candidate2`, `candidate3`, ...
pub fn suggest_unique_name<S: AsRef<str>>(candidate: &str, existing: &[S]) -> String {
    let taken = |name: &str| existing.iter().any(|e| e.as_ref() == name);

    if !taken(candidate) {
        return candidate.to_string();
    }

    (2..)
        .map(|i| format!("{candidate}{i}"))
        .find(|suggestion| !taken(suggestion))
        .unwrap_or_else(|| candidate.to_string())
}

/// Whether `name` is usable as a single path segment: not empty, not hidden
/// and without separators
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\', '\0'])
}

/// Derives a workspace name from a repository url or display name
///
/// i.e. `https://example.com/Org/My Repo.git` becomes `my-repo`
pub fn derive_name(repository: &str) -> String {
    let base = repository
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let base = unescape(base).to_lowercase();
    let base = base.strip_suffix(".git").unwrap_or(&base);

    NON_SLUG
        .replace_all(base, "-")
        .trim_matches('-')
        .to_string()
}

// Query style unescaping: `+` is a space and invalid escapes are left alone
fn unescape(input: &str) -> String {
    let input = input.replace('+', " ");
    urlencoding::decode(&input)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(input)
}
