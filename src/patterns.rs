use std::fmt;

use crate::errors::*;

const A: u8 = 0b0001;
const C: u8 = 0b0010;
const G: u8 = 0b0100;
const T: u8 = 0b1000;
const ANY: u8 = A | C | G | T;

// set of concrete bases accepted by each pattern byte
static ACCEPT_LUT: [u8; 256] = {
    let mut l = [ANY; 256];

    let codes: [(u8, u8); 15] = [
        (b'A', A),
        (b'C', C),
        (b'G', G),
        (b'T', T),
        (b'U', T),
        (b'R', A | G),
        (b'Y', C | T),
        (b'S', C | G),
        (b'W', A | T),
        (b'K', G | T),
        (b'M', A | C),
        (b'B', C | G | T),
        (b'D', A | G | T),
        (b'H', A | C | T),
        (b'V', A | C | G),
    ];

    let mut i = 0;
    while i < codes.len() {
        let (c, m) = codes[i];
        l[c as usize] = m;
        l[c.to_ascii_lowercase() as usize] = m;
        i += 1;
    }

    l
};

// base contributed by a read byte, 0 for anything that is not a concrete base
static BASE_LUT: [u8; 256] = {
    let mut l = [0u8; 256];
    l[b'A' as usize] = A;
    l[b'a' as usize] = A;
    l[b'C' as usize] = C;
    l[b'c' as usize] = C;
    l[b'G' as usize] = G;
    l[b'g' as usize] = G;
    l[b'T' as usize] = T;
    l[b't' as usize] = T;
    l
};

// 0 marks bytes outside the supported alphabet
static COMP_LUT: [u8; 256] = {
    let mut l = [0u8; 256];

    let pairs: [(u8, u8); 8] = [
        (b'A', b'T'),
        (b'C', b'G'),
        (b'R', b'Y'),
        (b'K', b'M'),
        (b'B', b'V'),
        (b'D', b'H'),
        (b'S', b'S'),
        (b'W', b'W'),
    ];

    let mut i = 0;
    while i < pairs.len() {
        let (x, y) = pairs[i];
        l[x as usize] = y;
        l[y as usize] = x;
        l[x.to_ascii_lowercase() as usize] = y.to_ascii_lowercase();
        l[y.to_ascii_lowercase() as usize] = x.to_ascii_lowercase();
        i += 1;
    }

    l[b'N' as usize] = b'N';
    l[b'n' as usize] = b'n';
    l
};

/// Reverse complement a DNA sequence that may contain IUPAC ambiguity codes.
///
/// Case is preserved. Fails on any byte outside `ACGTN` and the IUPAC codes.
pub fn revcomp(seq: &[u8]) -> Result<Vec<u8>> {
    seq.iter()
        .rev()
        .map(|&c| match COMP_LUT[c as usize] {
            0 => Err(Error::InvalidSequence {
                string: utf8(seq),
                character: c as char,
            }),
            comp => Ok(comp),
        })
        .collect()
}

/// A fixed-length DNA pattern where ambiguous positions accept a set of bases.
///
/// Every IUPAC code accepts the bases it stands for and any other non-`ACGT`
/// byte (`N`, `.`, ...) accepts all four. Read bases that are not concrete
/// (e.g. an `N` call in the read) never match.
#[derive(Clone, PartialEq, Eq)]
pub struct Pattern {
    source: Vec<u8>,
    accept: Vec<u8>,
}

impl Pattern {
    pub fn new(pattern: impl AsRef<[u8]>) -> Self {
        let source = pattern.as_ref().to_ascii_uppercase();
        let accept = source.iter().map(|&c| ACCEPT_LUT[c as usize]).collect();
        Self { source, accept }
    }

    /// Compile the reverse complement of a pattern.
    pub fn revcomp(&self) -> Result<Self> {
        Ok(Self::new(revcomp(&self.source)?))
    }

    pub fn len(&self) -> usize {
        self.accept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accept.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.source
    }

    /// Whether `text` has the same length as the pattern and every base is accepted.
    pub fn matches(&self, text: &[u8]) -> bool {
        text.len() == self.accept.len() && self.matches_at(text, 0)
    }

    /// Leftmost position in `text` where the pattern matches.
    pub fn find(&self, text: &[u8]) -> Option<usize> {
        if text.len() < self.accept.len() {
            return None;
        }

        (0..=text.len() - self.accept.len()).find(|&i| self.matches_at(text, i))
    }

    fn matches_at(&self, text: &[u8], start: usize) -> bool {
        self.accept
            .iter()
            .zip(&text[start..start + self.accept.len()])
            .all(|(&m, &c)| m & BASE_LUT[c as usize] != 0)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({})", utf8(&self.source))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utf8(&self.source))
    }
}
