//! Specific error types for code generation operations

use thiserror::Error;

/// Errors that can occur during constant pool operations
#[derive(Error, Debug)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space")]
    OutOfSpace,
    #[error("Invalid constant pool index: {0}")]
    InvalidIndex(u16),
    #[error("Constant too long for a CONSTANT_Utf8 entry: {len} bytes")]
    Utf8TooLong { len: usize },
}

/// Errors that can occur during class file generation
#[derive(Error, Debug)]
pub enum ClassGenerationError {
    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),
    #[error("Method generation error in {method}: {source}")]
    MethodGeneration {
        method: String,
        #[source]
        source: BytecodeError,
    },
    #[error("Attribute generation error: {0}")]
    AttributeGeneration(#[from] AttributeGenerationError),
    #[error("Missing analysis result for {what}")]
    MissingAnalysis { what: String },
    #[error("Unsupported construct in code generation: {what}")]
    Unsupported { what: String },
}

/// Errors that can occur during attribute generation
#[derive(Error, Debug)]
pub enum AttributeGenerationError {
    #[error("Attribute data too large: {size} bytes")]
    DataTooLarge { size: usize },
    #[error("Attribute validation failed: {reason}")]
    ValidationFailed { reason: String },
}

/// Errors that can occur during bytecode generation
#[derive(Error, Debug)]
pub enum BytecodeError {
    #[error("Stack underflow at pc {pc}")]
    StackUnderflow { pc: u16 },
    #[error("Operand stack mismatch at pc {pc}: expected [{expected}], found [{found}]")]
    StackMismatch { pc: u16, expected: String, found: String },
    #[error("Branch target too far: {offset}")]
    BranchTooFar { offset: i64 },
    #[error("Label {label} used but never placed")]
    UnplacedLabel { label: usize },
    #[error("Method code too large: {size} bytes")]
    CodeTooLarge { size: usize },
    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),
    #[error("Missing analysis result for {what}")]
    MissingAnalysis { what: String },
}

impl BytecodeError {
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingAnalysis { what: what.into() }
    }
}

/// Generic result type for code generation operations
pub type CodeGenResult<T> = Result<T, ClassGenerationError>;

/// Generic result type for constant pool operations
pub type ConstPoolResult<T> = Result<T, ConstPoolError>;

/// Generic result type for bytecode operations
pub type BytecodeResult<T> = Result<T, BytecodeError>;
