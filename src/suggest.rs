//! Levenshtein-distance "did you mean" suggestions for unknown keywords and
//! filter names, used to enrich parser diagnostics.

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

pub fn find_similar<'a>(word: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let word_lower = word.to_lowercase();
    let mut best: Option<(&str, usize)> = None;

    for &candidate in candidates {
        let dist = levenshtein(&word_lower, &candidate.to_lowercase());
        if dist <= max_distance {
            match best {
                None => best = Some((candidate, dist)),
                Some((_, d)) if dist < d => best = Some((candidate, dist)),
                _ => {}
            }
        }
    }

    best.map(|(s, _)| s)
}

/// Statement keywords recognized after `{%`, used to power typo suggestions
/// for `ParseError::UnknownStatement`.
pub const KNOWN_STATEMENTS: &[&str] = &[
    "if", "elif", "else", "endif", "for", "endfor", "block", "endblock",
    "extends", "include", "import", "from", "set", "endset", "macro",
    "endmacro", "call", "endcall", "filter", "endfilter", "raw", "endraw",
    "with", "endwith", "autoescape", "endautoescape", "recursive",
];

/// Built-in filter names, used to power typo suggestions when an unknown
/// filter is referenced.
pub const KNOWN_FILTERS: &[&str] = &[
    "upper", "lower", "capitalize", "trim", "first", "last", "length",
    "count", "reverse", "sort", "join", "unique", "batch", "slice",
    "replace", "dictsort", "items", "int", "select", "title", "striptags",
    "escape", "e", "forceescape", "truncate", "wordwrap", "center", "indent",
    "format", "urlencode", "tojson", "pprint", "abs", "round", "default",
    "d", "min", "max", "wordcount", "attr", "safe", "float", "list",
    "string", "sum", "reject",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn levenshtein_one_char_diff() {
        assert_eq!(levenshtein("hello", "hallo"), 1);
    }

    #[test]
    fn levenshtein_insertion() {
        assert_eq!(levenshtein("hello", "helllo"), 1);
    }

    #[test]
    fn levenshtein_deletion() {
        assert_eq!(levenshtein("hello", "helo"), 1);
    }

    #[test]
    fn levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn find_similar_typo_in_statement() {
        let result = find_similar("endfi", KNOWN_STATEMENTS, 2);
        assert_eq!(result, Some("endif"));
    }

    #[test]
    fn find_similar_typo_in_filter() {
        let result = find_similar("upr", KNOWN_FILTERS, 2);
        assert_eq!(result, Some("upper"));
    }

    #[test]
    fn find_similar_no_match() {
        let result = find_similar("xyzzy", KNOWN_STATEMENTS, 2);
        assert_eq!(result, None);
    }

    #[test]
    fn find_similar_case_insensitive() {
        let result = find_similar("ENDIF", KNOWN_STATEMENTS, 2);
        assert_eq!(result, Some("endif"));
    }
}
