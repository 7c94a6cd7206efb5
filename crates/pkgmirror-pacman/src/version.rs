//! RPM-style version comparison, ported from
//! `examples/original_source/packet/version.go`.
//!
//! A version string decomposes as `epoch:version-release` (colon and dash
//! both optional; `epoch` defaults to `"0"`, `release` to `""`). The three
//! parts are compared left to right with [`rpm_ver_cmp`]; the first
//! nonzero result wins.

use std::cmp::Ordering;

struct Version<'a> {
    epoch: &'a str,
    version: &'a str,
    release: &'a str,
}

fn split_version(s: &str) -> Version<'_> {
    let (epoch, rest) = match s.split_once(':') {
        Some((e, r)) => (e, r),
        None => ("0", s),
    };
    let (version, release) = rest.split_once('-').unwrap_or((rest, ""));
    Version {
        epoch,
        version,
        release,
    }
}

fn is_alnum(c: u8) -> bool {
    c.is_ascii_digit() || c.is_ascii_alphabetic()
}

/// RPM `rpmvercmp`: walk both strings in lockstep, skipping runs of
/// non-alphanumeric separators, then comparing digit runs numerically and
/// letter runs lexicographically. Digit runs always outrank letter runs.
fn rpm_ver_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    // Tracks the end of the previously compared run, so the separator-skip
    // length ahead of the *next* run can be compared between `a` and `b`.
    let (mut prev_i, mut prev_j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        while i < a.len() && !is_alnum(a[i]) {
            i += 1;
        }
        while j < b.len() && !is_alnum(b[j]) {
            j += 1;
        }

        if i >= a.len() || j >= b.len() {
            break;
        }

        let ord = (i - prev_i).cmp(&(j - prev_j));
        if ord != Ordering::Equal {
            return ord;
        }

        let start_i = i;
        let start_j = j;
        let mut end_i = i;
        let mut end_j = j;

        let is_num = a[start_i].is_ascii_digit();
        if is_num {
            while end_i < a.len() && a[end_i].is_ascii_digit() {
                end_i += 1;
            }
            while end_j < b.len() && b[end_j].is_ascii_digit() {
                end_j += 1;
            }
        } else {
            while end_i < a.len() && a[end_i].is_ascii_alphabetic() {
                end_i += 1;
            }
            while end_j < b.len() && b[end_j].is_ascii_alphabetic() {
                end_j += 1;
            }
        }

        if end_j == start_j {
            return if is_num {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if is_num {
            let mut ti = start_i;
            let mut tj = start_j;
            while ti < a.len() && a[ti] == b'0' {
                ti += 1;
            }
            while tj < b.len() && b[tj] == b'0' {
                tj += 1;
            }
            let ord = (end_i - ti).cmp(&(end_j - tj));
            if ord != Ordering::Equal {
                return ord;
            }
            let ord = a[ti..end_i].cmp(&b[tj..end_j]);
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[start_i..end_i].cmp(&b[start_j..end_j]);
            if ord != Ordering::Equal {
                return ord;
            }
        }

        i = end_i;
        j = end_j;
        prev_i = start_i;
        prev_j = start_j;
    }

    if i >= a.len() && j >= b.len() {
        return Ordering::Equal;
    }
    if i >= a.len() {
        return if is_alnum(b[j]) {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if is_alnum(a[i]) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Total order over pacman version strings: `epoch:version-release`.
pub fn compare_versions(v1: &str, v2: &str) -> Ordering {
    let a = split_version(v1);
    let b = split_version(v2);

    let ord = rpm_ver_cmp(a.epoch, b.epoch);
    if ord != Ordering::Equal {
        return ord;
    }
    let ord = rpm_ver_cmp(a.version, b.version);
    if ord != Ordering::Equal {
        return ord;
    }
    rpm_ver_cmp(a.release, b.release)
}
