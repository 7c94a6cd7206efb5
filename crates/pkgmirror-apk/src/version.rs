//! apk-tools-style version comparison.
//!
//! The original implementation calls into Alpine's C `apk_version_compare`
//! via cgo (`examples/original_source/impl/apk/version.go`); that isn't
//! something to carry forward into a Rust workspace with no C toolchain in
//! its dependency stack, so this is a from-scratch Rust port of the
//! documented grammar: dotted numeric components, an optional single
//! trailing letter, an optional `_pre|_alpha|_beta|_rc|_p[<n>]` tag, and an
//! optional trailing `-r<n>` package revision.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
struct ApkVersion {
    numeric: Vec<u64>,
    letter: Option<char>,
    tag_rank: u8,
    tag_num: u64,
    revision: u64,
}

/// Pre-release tags rank below a bare final version; `p` (post-release
/// patch) ranks above it. Anything unrecognized is treated as final.
const TAG_FINAL: u8 = 4;

fn tag_rank(tag: &str) -> u8 {
    match tag {
        "pre" => 0,
        "alpha" => 1,
        "beta" => 2,
        "rc" => 3,
        "p" => 5,
        _ => TAG_FINAL,
    }
}

fn take_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn parse(s: &str) -> ApkVersion {
    let (main, revision) = match s.rfind("-r") {
        Some(idx) if s[idx + 2..].chars().all(|c| c.is_ascii_digit()) && !s[idx + 2..].is_empty() => {
            (&s[..idx], s[idx + 2..].parse().unwrap_or(0))
        }
        _ => (s, 0),
    };

    let mut rest = main;
    let mut numeric = Vec::new();
    loop {
        let (digits, tail) = take_digits(rest);
        if digits.is_empty() {
            break;
        }
        numeric.push(digits.parse().unwrap_or(0));
        rest = tail;
        if let Some(tail) = rest.strip_prefix('.') {
            rest = tail;
        } else {
            break;
        }
    }

    let mut letter = None;
    if let Some(c) = rest.chars().next() {
        if c.is_ascii_lowercase() {
            let after = &rest[c.len_utf8()..];
            if after.is_empty() || after.starts_with('_') {
                letter = Some(c);
                rest = after;
            }
        }
    }

    let mut tag_rank_value = TAG_FINAL;
    let mut tag_num = 0;
    if let Some(tail) = rest.strip_prefix('_') {
        let end = tail
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(tail.len());
        let (name, tail) = tail.split_at(end);
        tag_rank_value = tag_rank(name);
        let (digits, _) = take_digits(tail);
        if !digits.is_empty() {
            tag_num = digits.parse().unwrap_or(0);
        }
    } else if let Some(c) = rest.chars().next() {
        // A trailing letter with no separator, immediately followed by
        // digits (e.g. "p1"), is a post-release patch tag rather than the
        // single trailing letter handled above (which requires the letter
        // to be the very last character).
        if c.is_ascii_lowercase() {
            let (digits, _) = take_digits(&rest[c.len_utf8()..]);
            if !digits.is_empty() {
                tag_rank_value = tag_rank(&c.to_string());
                tag_num = digits.parse().unwrap_or(0);
            }
        }
    }

    ApkVersion {
        numeric,
        letter,
        tag_rank: tag_rank_value,
        tag_num,
        revision,
    }
}

fn compare_numeric(a: &[u64], b: &[u64]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.cmp(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Total order over apk version strings.
pub fn compare_versions(v1: &str, v2: &str) -> Ordering {
    let a = parse(v1);
    let b = parse(v2);

    let ord = compare_numeric(&a.numeric, &b.numeric);
    if ord != Ordering::Equal {
        return ord;
    }
    let ord = a.letter.cmp(&b.letter);
    if ord != Ordering::Equal {
        return ord;
    }
    let ord = a.tag_rank.cmp(&b.tag_rank);
    if ord != Ordering::Equal {
        return ord;
    }
    let ord = a.tag_num.cmp(&b.tag_num);
    if ord != Ordering::Equal {
        return ord;
    }
    a.revision.cmp(&b.revision)
}
