use std::cmp::Ordering;

/// Output order of ESV names.
///
/// Two names that both carry the prefix followed only by digits are ordered by
/// that number (`Zotu2` before `Zotu10`); two other names are ordered as plain
/// strings. Numbered names sort before all others so the order stays total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EsvOrder {
    prefix: Option<String>,
}

impl EsvOrder {
    pub fn new(prefix: Option<impl Into<String>>) -> Self {
        Self {
            prefix: prefix.map(Into::into),
        }
    }

    pub fn lexicographic() -> Self {
        Self { prefix: None }
    }

    fn numeric_suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        let suffix = name.strip_prefix(self.prefix.as_deref()?)?;
        if !suffix.is_empty() && suffix.bytes().all(|c| c.is_ascii_digit()) {
            Some(suffix)
        } else {
            None
        }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (self.numeric_suffix(a), self.numeric_suffix(b)) {
            (Some(x), Some(y)) => cmp_decimal(x, y).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}

// compare digit strings of any length by value
fn cmp_decimal(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
