//! Open-mode strings (`r`, `w+`, `ab`, ...)

use std::fmt;
use std::str::FromStr;

use crate::error::FsError;

/// A parsed open mode
///
/// The first character is the base mode; a `+` anywhere after it adds the
/// complementary access, and whatever else remains is the flag (`b` or
/// `t`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMode {
    raw: String,
    base: char,
    plus: bool,
    flag: String,
}

impl StreamMode {
    pub fn base(&self) -> char {
        self.base
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    pub fn allows_read(&self) -> bool {
        self.plus || self.base == 'r'
    }

    pub fn allows_write(&self) -> bool {
        self.plus || self.base != 'r'
    }

    pub fn allows_existing(&self) -> bool {
        self.base != 'x'
    }

    pub fn allows_new(&self) -> bool {
        self.base != 'r'
    }

    pub fn implies_truncate(&self) -> bool {
        self.base == 'w'
    }

    pub fn implies_position_at_end(&self) -> bool {
        self.base == 'a'
    }

    pub fn is_binary(&self) -> bool {
        self.flag == "b"
    }

    pub fn is_text(&self) -> bool {
        self.flag == "t"
    }
}

impl FromStr for StreamMode {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let base = match chars.next() {
            Some(c @ ('r' | 'w' | 'a' | 'x')) => c,
            _ => return Err(FsError::InvalidArgument(format!("Invalid stream mode: {:?}", s))),
        };
        let rest = chars.as_str();
        let plus = rest.contains('+');
        let flag: String = rest.chars().filter(|c| *c != '+').collect();
        if !matches!(flag.as_str(), "" | "b" | "t") || rest.matches('+').count() > 1 {
            return Err(FsError::InvalidArgument(format!("Invalid stream mode: {:?}", s)));
        }

        Ok(Self {
            raw: s.to_string(),
            base,
            plus,
            flag,
        })
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
