//! User operation pipeline
//!
//! [SmartAccountClient] turns an intent (one or more calls) into a signed user operation for a
//! [SmartAccount] and submits it to a bundler. Each step is a [UserOperationMiddleware] stage
//! taking the operation built so far and returning the next version of it.

mod account;
mod bundler;
mod client;
mod config;
mod error;
pub mod middleware;
mod signer;
mod types;

pub use account::{SimpleAccount, SmartAccount};
pub use bundler::BundlerClient;
pub use client::SmartAccountClient;
pub use config::{
    CustomMiddleware, Erc20Context, FeePolicy, FeeRule, PipelineConfig, ReceiptPollingConfig,
    SponsorshipMode, SponsorshipPolicy,
};
pub use error::PipelineError;
pub use middleware::{MiddlewareContext, UserOperationMiddleware};
pub use signer::UserOperationSigner;
pub use types::{
    apply_multiplier, BuiltUserOperation, Call, GasOverride, UserOperationIntent,
    UserOperationOverrides,
};
