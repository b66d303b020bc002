use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use super::domain::Person;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.9;

/// Names with more parts than this are compared as written instead of in every order,
/// keeping the number of arrangements tried below 8! = 40320.
pub const MAX_NAME_PARTS: usize = 8;

/// Sequences at least this long drop characters that appear in more than 1% of positions
/// from the match index.
const POPULAR_CHARACTER_MIN_LEN: usize = 200;

fn is_alignment_noise(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Ratcliff/Obershelp sequence matcher over characters.
///
/// Whitespace in the second sequence is treated as junk: a matching block may never start
/// on it, but blocks are extended across it when both sides agree.
#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    b2j: HashMap<char, Vec<usize>>,
    b_junk: HashSet<char>,
}

impl SequenceMatcher {
    pub fn new(a: &str, b: &str) -> Self {
        let mut matcher = Self {
            a: a.chars().collect(),
            b: Vec::new(),
            b2j: HashMap::new(),
            b_junk: HashSet::new(),
        };
        matcher.set_second(b);
        matcher
    }

    /// Replaces the second sequence, keeping the first.
    pub fn set_second(&mut self, b: &str) {
        self.b = b.chars().collect();

        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (index, &c) in self.b.iter().enumerate() {
            b2j.entry(c).or_default().push(index);
        }

        let mut b_junk = HashSet::new();
        b2j.retain(|c, _| {
            if is_alignment_noise(*c) {
                b_junk.insert(*c);
                false
            } else {
                true
            }
        });

        let len = self.b.len();
        if len >= POPULAR_CHARACTER_MIN_LEN {
            let limit = len / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        self.b2j = b2j;
        self.b_junk = b_junk;
    }

    /// Similarity in `[0, 1]`: twice the matched characters over the combined length.
    pub fn ratio(&self) -> f64 {
        let matched = self.matching_characters();
        scaled_ratio(matched, self.a.len() + self.b.len())
    }

    /// Upper bound on [`ratio`](Self::ratio) from character multiset overlap alone.
    pub fn quick_ratio(&self) -> f64 {
        let mut available: HashMap<char, isize> = HashMap::new();
        for &c in &self.b {
            *available.entry(c).or_insert(0) += 1;
        }

        let mut matched = 0;
        for c in &self.a {
            let remaining = available.entry(*c).or_insert(0);
            if *remaining > 0 {
                matched += 1;
            }
            *remaining -= 1;
        }

        scaled_ratio(matched, self.a.len() + self.b.len())
    }

    fn is_b_junk(&self, c: char) -> bool {
        self.b_junk.contains(&c)
    }

    fn matching_characters(&self) -> usize {
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
            let (i, j, size) = self.find_longest_match(a_lo, a_hi, b_lo, b_hi);
            if size == 0 {
                continue;
            }

            matched += size;
            if a_lo < i && b_lo < j {
                pending.push((a_lo, i, b_lo, j));
            }
            if i + size < a_hi && j + size < b_hi {
                pending.push((i + size, a_hi, j + size, b_hi));
            }
        }

        matched
    }

    /// Longest matching block in `a[a_lo..a_hi]` and `b[b_lo..b_hi]`, earliest in `a` on ties.
    fn find_longest_match(
        &self,
        a_lo: usize,
        a_hi: usize,
        b_lo: usize,
        b_hi: usize,
    ) -> (usize, usize, usize) {
        let (a, b) = (&self.a, &self.b);
        let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);

        let mut run_lengths: HashMap<usize, usize> = HashMap::new();
        for i in a_lo..a_hi {
            let mut next_run_lengths = HashMap::new();
            if let Some(positions) = self.b2j.get(&a[i]) {
                for &j in positions {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let size = j
                        .checked_sub(1)
                        .and_then(|previous| run_lengths.get(&previous))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_run_lengths.insert(j, size);
                    if size > best_size {
                        best_i = i + 1 - size;
                        best_j = j + 1 - size;
                        best_size = size;
                    }
                }
            }
            run_lengths = next_run_lengths;
        }

        while best_i > a_lo
            && best_j > b_lo
            && !self.is_b_junk(b[best_j - 1])
            && a[best_i - 1] == b[best_j - 1]
        {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < a_hi
            && best_j + best_size < b_hi
            && !self.is_b_junk(b[best_j + best_size])
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }

        while best_i > a_lo
            && best_j > b_lo
            && self.is_b_junk(b[best_j - 1])
            && a[best_i - 1] == b[best_j - 1]
        {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < a_hi
            && best_j + best_size < b_hi
            && self.is_b_junk(b[best_j + best_size])
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }
}

fn scaled_ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    2.0 * matched as f64 / total as f64
}

/// Decides whether two identities likely belong to the same human.
///
/// Emails are compared directly. Names are compared against every ordering of the other
/// person's name parts, so "Nordmann Ola" matches "Ola Nordmann", unless that name has
/// more than [`MAX_NAME_PARTS`] parts. The check is advisory;
/// callers route every hit through the mark log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatcher {
    threshold: f64,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl SimilarityMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Not symmetric for names: `other`'s name parts are rearranged to fit `reference`.
    pub fn similar(&self, reference: &Person, other: &Person) -> bool {
        self.emails_match(reference, other) || self.names_match(reference, other)
    }

    fn emails_match(&self, reference: &Person, other: &Person) -> bool {
        // blank emails would otherwise match each other perfectly
        if reference.email().is_empty() || other.email().is_empty() {
            return false;
        }

        SequenceMatcher::new(reference.email(), other.email()).ratio() > self.threshold
    }

    fn names_match(&self, reference: &Person, other: &Person) -> bool {
        let parts = reference.name().split_whitespace().count();
        let other_parts: Vec<&str> = other.name().split_whitespace().collect();
        if parts == 0 || parts > other_parts.len() {
            return false;
        }
        if other_parts.len() > MAX_NAME_PARTS {
            return SequenceMatcher::new(reference.name(), other.name()).ratio() > self.threshold;
        }

        let mut matcher = SequenceMatcher::new(reference.name(), "");
        let mut best = 0.0;
        for arrangement in other_parts
            .iter()
            .permutations(parts)
            .map(|arrangement| arrangement.into_iter().join(" "))
        {
            matcher.set_second(&arrangement);
            if matcher.quick_ratio() < self.threshold {
                continue;
            }

            let ratio = matcher.ratio();
            if ratio > best {
                best = ratio;
                if best > self.threshold {
                    return true;
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn ratio_counts_longest_common_blocks() {
        assert_close(SequenceMatcher::new("abcd", "bcde").ratio(), 0.75);
        assert_close(SequenceMatcher::new("abc", "cba").ratio(), 1.0 / 3.0);
        assert_close(SequenceMatcher::new("same", "same").ratio(), 1.0);
        assert_close(SequenceMatcher::new("", "").ratio(), 1.0);
        assert_close(SequenceMatcher::new("abc", "").ratio(), 0.0);
    }

    #[test]
    fn quick_ratio_bounds_ratio_from_above() {
        let matcher = SequenceMatcher::new("abc", "cba");
        assert_close(matcher.quick_ratio(), 1.0);
        assert!(matcher.quick_ratio() >= matcher.ratio());

        let matcher = SequenceMatcher::new("ola nordmann", "kari hansen");
        assert!(matcher.quick_ratio() >= matcher.ratio());
    }

    #[test]
    fn set_second_reuses_first_sequence() {
        let mut matcher = SequenceMatcher::new("abcd", "xxxx");
        assert_close(matcher.ratio(), 0.0);
        matcher.set_second("abcd");
        assert_close(matcher.ratio(), 1.0);
    }

    #[test]
    fn whitespace_cannot_anchor_a_match() {
        // the only shared characters are spaces, which never start a block
        assert_close(SequenceMatcher::new("a b", "c d").ratio(), 0.0);
        // but a block that starts on real characters extends across them
        assert_close(SequenceMatcher::new("ab cd", "ab cd").ratio(), 1.0);
    }

    #[test]
    fn reordered_names_are_similar_in_both_directions() {
        let first = Person::new("Ola Nordmann", "x@x.com");
        let second = Person::new("Nordmann Ola", "x@x.com");
        assert!(first.similar(&second));
        assert!(second.similar(&first));

        let matcher = SimilarityMatcher::default();
        let first = Person::new("Ola Nordmann", "ola@example.com");
        let second = Person::new("Nordmann Ola", "kari.hansen@another.org");
        assert!(matcher.similar(&first, &second));
        assert!(matcher.similar(&second, &first));
    }

    #[test]
    fn name_typos_within_threshold_match() {
        let matcher = SimilarityMatcher::default();
        let first = Person::new("Ola Nordmann", "one@example.com");
        let second = Person::new("Ola Nordman", "two@elsewhere.org");
        assert!(matcher.similar(&first, &second));
    }

    #[test]
    fn email_typos_within_threshold_match() {
        let matcher = SimilarityMatcher::default();
        let first = Person::new("Someone", "ola.nordmann@gmail.com");
        let second = Person::new("Else Entirely", "ola.nordmann@gmail.con");
        assert!(matcher.similar(&first, &second));
        assert!(matcher.similar(&second, &first));
    }

    #[test]
    fn unrelated_people_do_not_match() {
        let matcher = SimilarityMatcher::default();
        let first = Person::new("Kari Hansen", "kari@a.no");
        let second = Person::new("Per Olsen", "per@b.com");
        assert!(!matcher.similar(&first, &second));
        assert!(!matcher.similar(&second, &first));
    }

    #[test]
    fn blank_emails_do_not_match_each_other() {
        let matcher = SimilarityMatcher::default();
        let first = Person::new("Kari Hansen", "");
        let second = Person::new("Per Olsen", "");
        assert!(!matcher.similar(&first, &second));
    }

    #[test]
    fn subset_of_name_parts_matches_only_from_shorter_side() {
        let matcher = SimilarityMatcher::default();
        let short = Person::new("Ola Nordmann", "ola@example.com");
        let long = Person::new("Per Nordmann Ola", "per@elsewhere.org");

        assert!(matcher.similar(&short, &long));
        assert!(!matcher.similar(&long, &short));
    }

    #[test]
    fn long_names_are_compared_in_the_given_order() {
        let words = [
            "ana", "beatriz", "carla", "dolores", "elena", "fatima", "gloria", "helena",
            "ines", "julia", "karina", "lucia",
        ];
        let forward = Person::new(words.join(" "), "one@example.com");
        let backward = Person::new(
            words.iter().rev().copied().collect::<Vec<_>>().join(" "),
            "two@elsewhere.org",
        );
        let copy = Person::new(words.join(" "), "three@another.net");
        let matcher = SimilarityMatcher::default();

        assert!(matcher.similar(&forward, &copy));
        assert!(!matcher.similar(&forward, &backward));
        assert!(!matcher.similar(&backward, &forward));
    }

    #[test]
    fn threshold_is_configurable() {
        let first = Person::new("Jon Doe", "jon@example.com");
        let second = Person::new("Jon Due", "due@elsewhere.org");

        assert!(!SimilarityMatcher::default().similar(&first, &second));
        assert!(SimilarityMatcher::new(0.8).similar(&first, &second));
    }
}
