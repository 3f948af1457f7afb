use std::fmt;

use basalt_ir::{BlockId, FuncRef, GlobalRef, InstId, ValueId, VTableRef, WitnessTableRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    InvalidValueRef,
    InvalidBlockRef,
    InvalidFuncRef,
    InvalidTypeRef,
    InvalidInstRef,
    InvalidGlobalRef,
    InvalidMethodRef,
    InvalidConformanceRef,
    EmptyBlock,
    TerminatorNotLast,
    MissingTerminator,
    EdgeAsymmetry,
    BranchTargetMismatch,
    EntryArgMismatch,
    MultipleEpilogBlocks,
    BranchArgMismatch,
    ExternalFunctionWithBody,
    MissingEntryBlock,
    EdgeTerminatorMismatch,
    LocationKindMisplaced,
    UseNotDominated,
    OperandUserMismatch,
    UseListBroken,
    DanglingOperand,
    OperandTypeMismatch,
    ResultTypeMismatch,
    AddressObjectMismatch,
    FieldMismatch,
    CaseMismatch,
    RepresentationMismatch,
    InvalidCastShape,
    ReferenceSemanticsRequired,
    ReturnTypeMismatch,
    ArityMismatch,
    EscapedArchetype,
    SubstitutionShapeMismatch,
    CalleeSignatureMismatch,
    WitnessSelfShapeMismatch,
    ExistentialProtocolViolation,
    MissingWitnessTableForConformance,
    MissingGenericEnv,
    PartialApplyShapeMismatch,
    DynamicMethodShapeMismatch,
    MissingSwitchCase,
    DuplicateSwitchCase,
    DefaultWithArguments,
    SwitchCaseArgMismatch,
    SpuriousDefault,
    StackUnbalanced,
    StackMismatchAtMerge,
    StackNotEmptyAtReturn,
    DeallocOrderMismatch,
    DuplicateSymbol,
    DuplicateVTable,
    VTableEntryInvalid,
    DuplicateWitnessTable,
    WitnessTableEntryInvalid,
    GlobalAddressType,
}

impl DiagnosticCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::InvalidValueRef => 1,
            Self::InvalidBlockRef => 2,
            Self::InvalidFuncRef => 3,
            Self::InvalidTypeRef => 4,
            Self::InvalidInstRef => 5,
            Self::InvalidGlobalRef => 6,
            Self::InvalidMethodRef => 7,
            Self::InvalidConformanceRef => 8,
            Self::EmptyBlock => 100,
            Self::TerminatorNotLast => 101,
            Self::MissingTerminator => 102,
            Self::EdgeAsymmetry => 103,
            Self::BranchTargetMismatch => 104,
            Self::EntryArgMismatch => 105,
            Self::MultipleEpilogBlocks => 106,
            Self::BranchArgMismatch => 107,
            Self::ExternalFunctionWithBody => 108,
            Self::MissingEntryBlock => 109,
            Self::EdgeTerminatorMismatch => 110,
            Self::LocationKindMisplaced => 111,
            Self::UseNotDominated => 200,
            Self::OperandUserMismatch => 201,
            Self::UseListBroken => 202,
            Self::DanglingOperand => 203,
            Self::OperandTypeMismatch => 300,
            Self::ResultTypeMismatch => 301,
            Self::AddressObjectMismatch => 302,
            Self::FieldMismatch => 303,
            Self::CaseMismatch => 304,
            Self::RepresentationMismatch => 305,
            Self::InvalidCastShape => 306,
            Self::ReferenceSemanticsRequired => 307,
            Self::ReturnTypeMismatch => 308,
            Self::ArityMismatch => 309,
            Self::EscapedArchetype => 400,
            Self::SubstitutionShapeMismatch => 401,
            Self::CalleeSignatureMismatch => 402,
            Self::WitnessSelfShapeMismatch => 403,
            Self::ExistentialProtocolViolation => 404,
            Self::MissingWitnessTableForConformance => 405,
            Self::MissingGenericEnv => 406,
            Self::PartialApplyShapeMismatch => 407,
            Self::DynamicMethodShapeMismatch => 408,
            Self::MissingSwitchCase => 500,
            Self::DuplicateSwitchCase => 501,
            Self::DefaultWithArguments => 502,
            Self::SwitchCaseArgMismatch => 503,
            Self::SpuriousDefault => 504,
            Self::StackUnbalanced => 600,
            Self::StackMismatchAtMerge => 601,
            Self::StackNotEmptyAtReturn => 602,
            Self::DeallocOrderMismatch => 603,
            Self::DuplicateSymbol => 700,
            Self::DuplicateVTable => 701,
            Self::VTableEntryInvalid => 702,
            Self::DuplicateWitnessTable => 703,
            Self::WitnessTableEntryInvalid => 704,
            Self::GlobalAddressType => 705,
        }
    }

    pub fn as_str(self) -> String {
        format!("IR{:04}", self.as_u16())
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => "error".fmt(f),
            Self::Warning => "warning".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Module,
    Function(FuncRef),
    Global(GlobalRef),
    VTable(VTableRef),
    WitnessTable(WitnessTableRef),
    Block {
        func: FuncRef,
        block: BlockId,
    },
    Inst {
        func: FuncRef,
        block: Option<BlockId>,
        inst: InstId,
    },
    Value {
        func: FuncRef,
        value: ValueId,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => "module".fmt(f),
            Self::Function(func) => write!(f, "func{}", func.as_u32()),
            Self::Global(global) => write!(f, "global{}", global.as_u32()),
            Self::VTable(vtable) => write!(f, "vtable{}", vtable.as_u32()),
            Self::WitnessTable(table) => write!(f, "witness_table{}", table.as_u32()),
            Self::Block { func, block } => {
                write!(f, "func{}:block{}", func.as_u32(), block.as_u32())
            }
            Self::Inst { func, block, inst } => {
                if let Some(block) = block {
                    write!(
                        f,
                        "func{}:block{}:inst{}",
                        func.as_u32(),
                        block.as_u32(),
                        inst.as_u32()
                    )
                } else {
                    write!(f, "func{}:inst{}", func.as_u32(), inst.as_u32())
                }
            }
            Self::Value { func, value } => write!(f, "func{}:v{}", func.as_u32(), value.as_u32()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext {
    pub function_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub primary: Location,
    pub notes: Vec<Note>,
    pub context: Option<DiagnosticContext>,
    pub snippet: Option<String>,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        message: impl Into<String>,
        primary: Location,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            primary,
            notes: Vec::new(),
            context: None,
            snippet: None,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Error, message, primary)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, primary: Location) -> Self {
        Self::new(code, Severity::Warning, message, primary)
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            message: message.into(),
        });
        self
    }

    pub fn with_context(mut self, context: DiagnosticContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} @ {}",
            self.severity, self.code, self.message, self.primary
        )?;

        if let Some(context) = &self.context {
            write!(f, " (in {})", context.function_name)?;
        }

        writeln!(f)?;

        if let Some(snippet) = &self.snippet {
            writeln!(f, "  | {snippet}")?;
        }

        for note in &self.notes {
            writeln!(f, "  note: {}", note.message)?;
        }

        Ok(())
    }
}
