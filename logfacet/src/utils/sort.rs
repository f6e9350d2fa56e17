//! Alphanumeric ("natural") ordering for identifiers
//!
//! Identifiers are split into maximal runs of ASCII digits and non-digits.
//! Digit runs compare by integer value, text runs compare lexicographically,
//! so `agent-2` sorts before `agent-10`.

use std::cmp::Ordering;

/// A maximal run of either digits or non-digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

impl<'a> Chunk<'a> {
    fn as_str(&self) -> &'a str {
        match self {
            Self::Digits(s) | Self::Text(s) => s,
        }
    }
}

/// Iterator over the digit/non-digit runs of a string
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits {
            Chunk::Digits(head)
        } else {
            Chunk::Text(head)
        })
    }
}

fn chunks(s: &str) -> Chunks<'_> {
    Chunks { rest: s }
}

/// Compare two digit runs by value without parsing (no overflow on long runs)
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_chunk(a: Chunk<'_>, b: Chunk<'_>) -> Ordering {
    match (a, b) {
        (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
        _ => a.as_str().cmp(b.as_str()),
    }
}

/// Total ordering over mixed numeric/text identifiers.
///
/// Runs are compared pairwise; when one identifier runs out of runs first it
/// sorts first. Identifiers whose runs are all equal by value (`a01` vs `a1`)
/// fall back to a bytewise comparison so the order agrees with `==`.
pub fn alphanumeric_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);

    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match cmp_chunk(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return a.cmp(b),
        }
    }
}

/// Sort identifiers alphanumerically and drop duplicates
pub fn sort_alphanumeric(values: &mut Vec<String>) {
    values.sort_by(|a, b| alphanumeric_cmp(a, b));
    values.dedup();
}
