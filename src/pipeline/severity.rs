use std::fmt;

/// Priority class read from a `[SEV-N]` token in the monitor name.
///
/// This is a naming convention, not a field of the monitor: anything named
/// without the token (or with a typo in it) lands in `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Sev1,
    Sev2,
    Sev3,
    Sev4,
    Sev5,
    Unspecified,
}

impl Severity {
    /// Classes in report order. The token search follows the same order, so a
    /// name carrying two tokens gets the more severe one.
    pub const ALL: [Severity; 6] = [
        Severity::Sev1,
        Severity::Sev2,
        Severity::Sev3,
        Severity::Sev4,
        Severity::Sev5,
        Severity::Unspecified,
    ];

    pub fn from_name(name: &str) -> Self {
        // ASCII folding only, so the SQL `upper()` rule agrees.
        let upper = name.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .filter_map(|sev| sev.token().map(|token| (sev, token)))
            .find(|(_, token)| upper.contains(token))
            .map(|(sev, _)| sev)
            .unwrap_or(Severity::Unspecified)
    }

    pub fn token(&self) -> Option<&'static str> {
        match self {
            Severity::Sev1 => Some("[SEV-1]"),
            Severity::Sev2 => Some("[SEV-2]"),
            Severity::Sev3 => Some("[SEV-3]"),
            Severity::Sev4 => Some("[SEV-4]"),
            Severity::Sev5 => Some("[SEV-5]"),
            Severity::Unspecified => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Sev1 => "SEV-1",
            Severity::Sev2 => "SEV-2",
            Severity::Sev3 => "SEV-3",
            Severity::Sev4 => "SEV-4",
            Severity::Sev5 => "SEV-5",
            Severity::Unspecified => "Unspecified",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
