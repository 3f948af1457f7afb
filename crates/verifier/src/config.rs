#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationLevel {
    /// Structural and referential checks only.
    Fast,
    /// Adds type, generic, and dominance rules.
    Standard,
    /// Adds use-list consistency and stack discipline.
    Full,
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub level: VerificationLevel,
    pub max_diagnostics: usize,
    /// Stop after the first phase that produced an error.
    pub fail_fast: bool,
    pub check_dominance: bool,
    pub check_use_lists: bool,
    pub check_stack_discipline: bool,
}

impl VerifierConfig {
    pub fn for_level(level: VerificationLevel) -> Self {
        match level {
            VerificationLevel::Fast => Self {
                level,
                max_diagnostics: 200,
                fail_fast: false,
                check_dominance: false,
                check_use_lists: false,
                check_stack_discipline: false,
            },
            VerificationLevel::Standard => Self {
                level,
                max_diagnostics: 200,
                fail_fast: false,
                check_dominance: true,
                check_use_lists: false,
                check_stack_discipline: false,
            },
            VerificationLevel::Full => Self {
                level,
                max_diagnostics: 500,
                fail_fast: false,
                check_dominance: true,
                check_use_lists: true,
                check_stack_discipline: true,
            },
        }
    }

    pub fn should_check_types(&self) -> bool {
        !matches!(self.level, VerificationLevel::Fast)
    }

    pub fn should_check_dominance(&self) -> bool {
        self.check_dominance || matches!(self.level, VerificationLevel::Full)
    }

    pub fn should_check_use_lists(&self) -> bool {
        self.check_use_lists || matches!(self.level, VerificationLevel::Full)
    }

    pub fn should_check_stack_discipline(&self) -> bool {
        self.check_stack_discipline || matches!(self.level, VerificationLevel::Full)
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::for_level(VerificationLevel::Standard)
    }
}
