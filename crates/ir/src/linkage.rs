use std::fmt;

/// Linkage of module-level entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    /// Externally visible definition.
    #[default]
    Public,
    /// Reference to a public definition in another module.
    PublicExternal,
    /// Definition that may be emitted in multiple modules and merged.
    Shared,
    /// Definition visible only within the current module.
    Hidden,
    /// Reference to a hidden definition in another module.
    HiddenExternal,
    /// Definition visible only within the current file.
    Private,
}

impl Linkage {
    /// Returns `true` if this linkage refers to a definition that lives in
    /// another module.
    pub fn is_available_externally(self) -> bool {
        matches!(self, Self::PublicExternal | Self::HiddenExternal)
    }

    pub fn has_definition(self) -> bool {
        !self.is_available_externally()
    }

    fn visibility_rank(self) -> u8 {
        match self {
            Self::Public | Self::PublicExternal => 3,
            Self::Shared => 2,
            Self::Hidden | Self::HiddenExternal => 1,
            Self::Private => 0,
        }
    }

    /// Returns `true` if `self` is strictly narrower than `other`.
    pub fn is_less_visible_than(self, other: Linkage) -> bool {
        self.visibility_rank() < other.visibility_rank()
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::PublicExternal => "public_external",
            Self::Shared => "shared",
            Self::Hidden => "hidden",
            Self::HiddenExternal => "hidden_external",
            Self::Private => "private",
        };
        s.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_ordering() {
        assert!(Linkage::Private.is_less_visible_than(Linkage::Hidden));
        assert!(Linkage::Hidden.is_less_visible_than(Linkage::Public));
        assert!(!Linkage::Public.is_less_visible_than(Linkage::PublicExternal));
        assert!(!Linkage::Shared.is_less_visible_than(Linkage::Hidden));
    }
}
