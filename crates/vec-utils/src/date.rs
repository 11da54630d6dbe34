use bstr::{BStr, BString, ByteSlice};
use chrono::{TimeZone, Utc};

use crate::error::UtilError;
use crate::Result;

/// An identity attached to a commit or reflog entry.
///
/// Serialized form: `Name <email> <unix-seconds>`. Timestamps are plain
/// Unix seconds; no timezone is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    /// Seconds since the Unix epoch.
    pub when: i64,
}

impl Signature {
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, when: i64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// An identity stamped with the current time.
    pub fn now(name: impl Into<BString>, email: impl Into<BString>) -> Self {
        let when = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::new(name, email, when)
    }

    /// Parse `Name <email> <timestamp>`.
    ///
    /// The email is delimited by the last `<`...`>` pair so names may
    /// contain angle brackets in theory, though validation elsewhere
    /// forbids writing such names.
    pub fn parse(data: &BStr) -> Result<Self> {
        let open = data
            .rfind_byte(b'<')
            .ok_or_else(|| UtilError::IdentityParse("missing '<'".into()))?;
        let close = data[open..]
            .find_byte(b'>')
            .map(|p| p + open)
            .ok_or_else(|| UtilError::IdentityParse("missing '>'".into()))?;

        let name = data[..open].trim_with(|c| c == ' ');
        let email = &data[open + 1..close];

        let rest = data[close + 1..].trim_with(|c| c == ' ');
        let when = std::str::from_utf8(rest)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                UtilError::IdentityParse(format!(
                    "invalid timestamp: {}",
                    rest.to_str_lossy()
                ))
            })?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            when,
        })
    }

    /// Serialize to `Name <email> <timestamp>`.
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::with_capacity(
            self.name.len() + self.email.len() + 16,
        ));
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.when.to_string().as_bytes());
        out
    }

    /// The display form without the timestamp: `Name <email>`.
    pub fn who(&self) -> BString {
        let mut out = BString::from(Vec::with_capacity(self.name.len() + self.email.len() + 3));
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b">");
        out
    }
}

/// Render a Unix timestamp for human consumption, e.g. in `log` output.
///
/// Format: `Thu Feb 13 23:31:30 2009 +0000` (always UTC).
pub fn format_timestamp(when: i64) -> String {
    match Utc.timestamp_opt(when, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%a %b %-d %H:%M:%S %Y +0000").to_string(),
        _ => format!("@{when}"),
    }
}
