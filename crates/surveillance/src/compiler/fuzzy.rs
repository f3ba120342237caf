//! "Did you mean" suggestions for misspelled field and operator names.

/// Closest whitelisted name to `input`, if it is close enough to be a typo.
///
/// Input is normalized first (case, `-` and spaces become `_`). A candidate
/// qualifies when its edit distance is at most half the longer name, counted
/// in characters. Ties go to the candidate listed first.
pub(crate) fn suggest<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let normalized: String = input
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();
    let input_len = normalized.chars().count();

    candidates
        .iter()
        .map(|&name| (name, edit_distance(&normalized, name)))
        .min_by_key(|&(_, distance)| distance)
        .filter(|&(name, distance)| distance <= input_len.max(name.chars().count()) / 2)
        .map(|(name, _)| name)
}

/// Levenshtein distance over chars, keeping a single row.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}
