//! Error and status taxonomy for the ironioc IOC core.
//!
//! Every fallible operation in the workspace returns [`Result`]. The variants
//! fall into the four classes the engine distinguishes: configuration errors
//! (detected at load/init, record marked non-functional), transient I/O
//! errors (surfaced as alarm severity), contract violations (defensively
//! detected, logged), and fatal errors (abort the affected operation).

use thiserror::Error;

/// Workspace-wide error type.
#[derive(Debug, Error)]
pub enum IocError {
    // --- configuration errors -------------------------------------------
    /// A record type with this name is already defined.
    #[error("duplicate record type `{0}`")]
    DuplicateRecordType(String),

    /// A field descriptor is internally inconsistent.
    #[error("bad field descriptor `{field}` in record type `{record_type}`: {reason}")]
    BadFieldDescriptor {
        record_type: String,
        field: String,
        reason: String,
    },

    /// No record type with this name is loaded.
    #[error("record type `{0}` not found")]
    RecordTypeNotFound(String),

    /// A record with this name already exists in the database.
    #[error("duplicate record name `{0}`")]
    DuplicateRecordName(String),

    /// No record with this name exists in the database.
    #[error("record `{0}` not found")]
    RecordNotFound(String),

    /// The record type has no field with this name.
    #[error("field `{field}` not found in record type `{record_type}`")]
    FieldNotFound {
        record_type: String,
        field: String,
    },

    /// No menu with this name is loaded.
    #[error("menu `{0}` not found")]
    MenuNotFound(String),

    /// The string is not a choice of the field's menu.
    #[error("`{choice}` is not a choice of menu `{menu}`")]
    BadChoice { menu: String, choice: String },

    /// The record has no device support bound, or the bound support is
    /// missing the I/O function the record type requires.
    #[error("record `{0}` has no usable device support")]
    MissingDeviceSupport(String),

    /// No device support with this name has been registered.
    #[error("device support `{0}` is not registered")]
    DeviceSupportNotFound(String),

    /// The device support declares fewer entry points than the record type
    /// requires.
    #[error("device support `{name}` declares {declared} functions, record type requires {required}")]
    DeviceSupportTooSmall {
        name: String,
        declared: usize,
        required: usize,
    },

    /// A textual definition or record-instance source failed to parse.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A field value string could not be converted to the field's type.
    #[error("invalid value `{text}` for {what}")]
    InvalidValue { what: String, text: String },

    // --- transient I/O errors -------------------------------------------
    /// Device support reported an I/O failure for this cycle.
    #[error("device I/O failed for record `{record}`: {message}")]
    DeviceIo { record: String, message: String },

    /// The link target's type cannot satisfy the requested transfer.
    #[error("link type mismatch: cannot transfer {from} as {to}")]
    LinkTypeMismatch {
        from: &'static str,
        to: &'static str,
    },

    /// A process-variable link has not connected yet. Retryable.
    #[error("link target `{0}` is not connected")]
    LinkNotConnected(String),

    /// A transfer requested more elements than the destination holds. The
    /// transfer is clamped; the error reports the misconfiguration.
    #[error("element count {count} exceeds destination capacity {capacity}")]
    ArrayBoundsExceeded { count: usize, capacity: usize },

    // --- contract violations --------------------------------------------
    /// `process` was entered while the record was already mid-cycle.
    #[error("record `{0}` is already being processed")]
    RecordActive(String),

    // --- fatal ----------------------------------------------------------
    /// The fixed-size pool is exhausted and bypass is disabled.
    #[error("pool exhausted ({capacity} nodes live)")]
    PoolExhausted { capacity: usize },

    /// A pool node failed its corruption check on release.
    #[error("pool corruption detected: {0}")]
    PoolCorruption(&'static str),

    /// Invariant violation inside the core itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IocError {
    /// Construct an [`IocError::Internal`] from any message.
    pub fn internal(msg: impl Into<String>) -> Self {
        IocError::Internal(msg.into())
    }

    /// True for conditions the caller may retry on a later scan.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IocError::LinkNotConnected(_) | IocError::DeviceIo { .. })
    }

    /// True for load/init-time misconfiguration (record marked
    /// non-functional, IOC keeps going).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            IocError::DuplicateRecordType(_)
                | IocError::BadFieldDescriptor { .. }
                | IocError::RecordTypeNotFound(_)
                | IocError::DuplicateRecordName(_)
                | IocError::FieldNotFound { .. }
                | IocError::MenuNotFound(_)
                | IocError::BadChoice { .. }
                | IocError::MissingDeviceSupport(_)
                | IocError::DeviceSupportNotFound(_)
                | IocError::DeviceSupportTooSmall { .. }
                | IocError::Parse { .. }
                | IocError::InvalidValue { .. }
        )
    }
}

/// Workspace-wide result alias.
pub type Result<T, E = IocError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_constructor_formats() {
        let err = IocError::internal("lock poisoned");
        assert_eq!(err.to_string(), "internal error: lock poisoned");
    }

    #[test]
    fn retryable_classification() {
        assert!(IocError::LinkNotConnected("remote:pv".into()).is_retryable());
        assert!(!IocError::DuplicateRecordName("x".into()).is_retryable());
    }

    #[test]
    fn configuration_classification() {
        assert!(IocError::MissingDeviceSupport("ai1".into()).is_configuration());
        assert!(!IocError::PoolExhausted { capacity: 8 }.is_configuration());
    }
}
