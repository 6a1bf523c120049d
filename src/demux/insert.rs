use crate::demux::Rejection;
use crate::errors::*;
use crate::patterns::Pattern;

/// Cuts the insert out of a classified read by locating the end anchor near
/// the tail of the read.
///
/// The anchor is expected to be followed by between `min_extra` and
/// `max_extra` further bases before the read ends.
#[derive(Debug, Clone)]
pub struct InsertExtractor {
    anchor: Pattern,
    anchor_rc: Pattern,
    min_extra: usize,
    max_extra: usize,
    min_len: usize,
    require_mate_anchor: bool,
}

impl InsertExtractor {
    pub fn new(anchor: impl AsRef<[u8]>, min_extra: usize, max_extra: usize) -> Result<Self> {
        if min_extra > max_extra {
            return Err(Error::Config(format!(
                "end anchor extra bases: minimum {min_extra} is greater than maximum {max_extra}"
            )));
        }

        let anchor = Pattern::new(anchor);
        if anchor.is_empty() {
            return Err(Error::Config("end anchor is empty".to_owned()));
        }

        Ok(Self {
            anchor_rc: anchor.revcomp()?,
            anchor,
            min_extra,
            max_extra,
            min_len: 0,
            require_mate_anchor: false,
        })
    }

    /// Reject inserts shorter than `min_len`.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    /// Reject pairs whose mate does not start with the reverse-complemented anchor.
    pub fn with_required_mate_anchor(mut self, require: bool) -> Self {
        self.require_mate_anchor = require;
        self
    }

    /// The insert between `start` and the leftmost end anchor in the tail window.
    pub fn extract<'a>(
        &self,
        seq: &'a [u8],
        start: usize,
    ) -> std::result::Result<&'a [u8], Rejection> {
        let window_start = seq
            .len()
            .saturating_sub(self.max_extra + self.anchor.len())
            .max(start);
        let window_end = seq.len().saturating_sub(self.min_extra);

        if window_start >= window_end {
            return Err(Rejection::NoEndAnchor);
        }

        let pos = self
            .anchor
            .find(&seq[window_start..window_end])
            .ok_or(Rejection::NoEndAnchor)?;
        let insert = &seq[start..window_start + pos];

        if insert.len() < self.min_len {
            return Err(Rejection::TooShort);
        }

        Ok(insert)
    }

    /// Trim the reverse-complemented anchor, and everything before it, off the
    /// start of a mate read.
    ///
    /// Returns the untrimmed mate when the anchor is not found, unless the mate
    /// anchor is required.
    pub fn trim_mate<'a>(&self, mate: &'a [u8]) -> std::result::Result<&'a [u8], Rejection> {
        let window_start = self.min_extra.min(mate.len());
        let window_end = mate.len().min(self.max_extra + self.anchor_rc.len());

        let found = if window_start < window_end {
            self.anchor_rc.find(&mate[window_start..window_end])
        } else {
            None
        };

        match found {
            Some(pos) => Ok(&mate[window_start + pos + self.anchor_rc.len()..]),
            None if self.require_mate_anchor => Err(Rejection::NoMateAnchor),
            None => Ok(mate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHOR: &str = "TCCACTAATCAYAARGATATTGG";

    fn extractor() -> InsertExtractor {
        InsertExtractor::new(ANCHOR, 1, 4).unwrap()
    }

    fn read(insert: &str, extra: &str) -> String {
        format!("HEADERXX{insert}TCCACTAATCACAAGGATATTGG{extra}")
    }

    #[test]
    fn extracts_insert_with_tolerated_tail() {
        let e = extractor();
        for extra in ["A", "AC", "ACG", "ACGT"] {
            let r = read("GATTACA", extra);
            assert_eq!(e.extract(r.as_bytes(), 8).unwrap(), b"GATTACA");
        }
    }

    #[test]
    fn tail_outside_window_is_rejected() {
        let e = extractor();
        // too few and too many trailing bases
        assert_eq!(
            e.extract(read("GATTACA", "").as_bytes(), 8),
            Err(Rejection::NoEndAnchor)
        );
        assert_eq!(
            e.extract(read("GATTACA", "ACGTA").as_bytes(), 8),
            Err(Rejection::NoEndAnchor)
        );
    }

    #[test]
    fn start_past_window_is_rejected() {
        let e = extractor();
        assert_eq!(e.extract(b"ACGT", 10), Err(Rejection::NoEndAnchor));
        assert_eq!(e.extract(b"", 0), Err(Rejection::NoEndAnchor));
    }

    #[test]
    fn minimum_insert_length() {
        let e = extractor().with_min_len(8);
        assert_eq!(
            e.extract(read("GATTACA", "AC").as_bytes(), 8),
            Err(Rejection::TooShort)
        );
        assert!(e.extract(read("GATTACAT", "AC").as_bytes(), 8).is_ok());
    }

    #[test]
    fn mate_trimming() {
        let e = extractor();
        let anchor_rc = crate::patterns::revcomp(b"TCCACTAATCACAAGGATATTGG").unwrap();
        let mut mate = b"NN".to_vec();
        mate.extend_from_slice(&anchor_rc);
        mate.extend_from_slice(b"TGTAATC");

        assert_eq!(e.trim_mate(&mate).unwrap(), b"TGTAATC");
        assert_eq!(e.trim_mate(b"TGTAATC").unwrap(), b"TGTAATC");

        let e = e.with_required_mate_anchor(true);
        assert_eq!(e.trim_mate(&mate).unwrap(), b"TGTAATC");
        assert_eq!(e.trim_mate(b"TGTAATC"), Err(Rejection::NoMateAnchor));
    }

    #[test]
    fn invalid_configuration() {
        assert!(InsertExtractor::new(ANCHOR, 5, 4).is_err());
        assert!(InsertExtractor::new("", 0, 4).is_err());
    }
}
