use thiserror::Error;

/// Failures raised while validating a prepare-time argument. These are
/// always surfaced as a local, non-mutating refusal (`false`/`None`) by the
/// caller in `pscatter-core`; this type exists so the reason is inspectable
/// in tests and logs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("length must be greater than zero")]
    ZeroLength,
    #[error("range of {len} bytes at {addr:#x} exceeds the per-call cap")]
    OversizeSingle { addr: u64, len: u64 },
    #[error("range of {len} bytes at {addr:#x} wraps past the end of the address space")]
    WrapsAround { addr: u64, len: u64 },
    #[error("address {addr:#x} fails the address-class check for this target")]
    AddressOutOfClass { addr: u64 },
    #[error("flag combination {flags:#x} is mutually exclusive")]
    IncompatibleFlags { flags: u32 },
    #[error("preparing {len} more bytes would exceed the handle's total-bytes quota")]
    TotalBytesExceeded { len: u64 },
    #[error("preparing this range would exceed the handle's total-pages quota")]
    TotalPagesExceeded,
}
