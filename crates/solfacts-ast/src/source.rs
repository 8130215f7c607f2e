//! Source spans in `start:length:fileIndex` form.

use std::fmt;
use std::str::FromStr;

use crate::AstError;

/// A byte range within one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub start: usize,
    pub length: usize,
    /// Index into the source list; `None` when the compiler reports `-1`.
    pub file: Option<usize>,
}

impl SourceLocation {
    /// The bytes this span covers, if it lies within `source`.
    pub fn slice<'a>(&self, source: &'a [u8]) -> Option<&'a [u8]> {
        let end = self.start.checked_add(self.length)?;
        source.get(self.start..end)
    }
}

impl FromStr for SourceLocation {
    type Err = AstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AstError::InvalidSource(s.to_string());
        let mut parts = s.split(':');
        let (Some(start), Some(length), Some(file), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let start = start.parse().map_err(|_| invalid())?;
        let length = length.parse().map_err(|_| invalid())?;
        let file: i64 = file.parse().map_err(|_| invalid())?;
        let file = if file < 0 {
            None
        } else {
            Some(usize::try_from(file).map_err(|_| invalid())?)
        };

        Ok(Self {
            start,
            length,
            file,
        })
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file {
            Some(file) => write!(f, "{}:{}:{}", self.start, self.length, file),
            None => write!(f, "{}:{}:-1", self.start, self.length),
        }
    }
}
