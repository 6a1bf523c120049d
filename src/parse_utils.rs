use std::ops::RangeInclusive;

use crate::errors::*;

/// Name of a FASTA record: the header up to the first whitespace.
pub fn fasta_name(header: &[u8]) -> &[u8] {
    let header = header.strip_prefix(b">").unwrap_or(header);
    match memchr::memchr2(b' ', b'\t', header) {
        Some(i) => &header[..i],
        None => header,
    }
}

/// Parse the trailing decimal digits of a primer name, e.g. `mlCOIint12` -> 12.
pub fn numeric_suffix(name: &str) -> Result<usize> {
    let digits = name
        .bytes()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();

    if digits == 0 {
        return Err(Error::PrimerSuffix(name.to_owned()));
    }

    name[name.len() - digits..]
        .parse()
        .map_err(|_| Error::PrimerSuffix(name.to_owned()))
}

/// Parse a range specifier such as `1-3,7,10-12`.
pub fn parse_ranges(spec: &str) -> Result<Vec<RangeInclusive<usize>>> {
    let err = |reason| Error::Range {
        string: spec.to_owned(),
        reason,
    };
    let parse = |s: &str| s.trim().parse::<usize>().map_err(|_| err("not a number"));

    let mut res = Vec::new();

    for part in spec.split(',') {
        if part.trim().is_empty() {
            return Err(err("empty element"));
        }

        let range = match part.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (parse(lo)?, parse(hi)?);
                if lo > hi {
                    return Err(err("range start is greater than its end"));
                }
                lo..=hi
            }
            None => {
                let n = parse(part)?;
                n..=n
            }
        };

        res.push(range);
    }

    Ok(res)
}

pub fn in_ranges(ranges: &[RangeInclusive<usize>], n: usize) -> bool {
    ranges.iter().any(|r| r.contains(&n))
}
