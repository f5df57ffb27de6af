use thiserror::Error;

/// User operation construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserOperationError {
    /// A field required for hashing or submission was never filled in
    #[error("user operation is missing field {field}")]
    MissingField {
        /// camelCase name of the field
        field: &'static str,
    },

    /// EntryPoint v0.7 packs this field into 128 bits
    #[error("{field} does not fit in uint128")]
    Uint128Overflow { field: &'static str },

    /// `paymasterAndData` is neither empty, a bare paymaster address nor the full v0.7 layout
    #[error("malformed paymasterAndData of {len} bytes")]
    MalformedPaymasterAndData { len: usize },
}

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Mnemonic phrase or derivation failure
    #[error("mnemonic error: {inner}")]
    Mnemonic { inner: String },

    /// Invalid private key
    #[error("invalid private key: {inner}")]
    PrivateKey { inner: String },

    /// Signing failure
    #[error("signing error: {inner}")]
    Signing { inner: String },
}
