use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AdvantgResult<T> = Result<T, AdvantgError>;
pub type ParserResult<T> = AdvantgResult<T>;
pub type ResolveResult<T> = AdvantgResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    InternalError,
}

impl ErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Failure classes for a rejected input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputErrorKind {
    UndefinedReference,
    CyclicDefinition,
    UnknownOption,
    TypeMismatch,
    MeshConsistency,
    Syntax,
    DuplicateParameter,
    DuplicateOption,
    MissingRequired,
    InvalidBinding,
}

impl InputErrorKind {
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::UndefinedReference => "INPUT.UNDEFINED_REFERENCE",
            Self::CyclicDefinition => "INPUT.CYCLIC_DEFINITION",
            Self::UnknownOption => "INPUT.UNKNOWN_OPTION",
            Self::TypeMismatch => "INPUT.TYPE_MISMATCH",
            Self::MeshConsistency => "INPUT.MESH_CONSISTENCY",
            Self::Syntax => "INPUT.SYNTAX",
            Self::DuplicateParameter => "INPUT.DUPLICATE_PARAMETER",
            Self::DuplicateOption => "INPUT.DUPLICATE_OPTION",
            Self::MissingRequired => "INPUT.MISSING_REQUIRED_OPTION",
            Self::InvalidBinding => "INPUT.INVALID_BINDING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvantgError {
    category: ErrorCategory,
    kind: Option<InputErrorKind>,
    placeholder: &'static str,
    message: String,
}

impl AdvantgError {
    pub fn new(
        category: ErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            kind: None,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input(kind: InputErrorKind, message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::InputValidationError,
            kind: Some(kind),
            placeholder: kind.placeholder(),
            message: message.into(),
        }
    }

    /// Shorthand for an input error that points at a source line.
    pub fn at_line(kind: InputErrorKind, line: usize, message: impl Display) -> Self {
        Self::input(kind, format!("line {line}: {message}"))
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    pub const fn kind(&self) -> Option<InputErrorKind> {
        self.kind
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for AdvantgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for AdvantgError {}
