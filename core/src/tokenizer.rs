use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"\w+").expect("valid regex");
}

/// Lazily split a line into lowercase word tokens.
///
/// Tokens are maximal runs of Unicode word characters; whitespace and
/// punctuation only ever separate tokens. The same rule is applied to query
/// terms by [`fold_query_terms`], so both sides of a lookup agree.
pub fn tokenize(line: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(line).map(|m| m.as_str().to_lowercase())
}

/// Fold raw query arguments into terms, in first-seen order without duplicates.
///
/// An argument like `"Cat,Dog"` contributes both `cat` and `dog`.
pub fn fold_query_terms<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for arg in raw {
        for token in tokenize(arg.as_ref()) {
            if !terms.contains(&token) {
                terms.push(token);
            }
        }
    }
    terms
}
