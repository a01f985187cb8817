//! # Resilience Module
//!
//! Retry with backoff for transient failures of external capabilities: per-item
//! promote calls and bulk job submission.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use promote_core::config::BackoffConfig;
//! use promote_core::resilience::RetryPolicy;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::new("promote_stage", BackoffConfig::fixed(3, 1_000));
//! let value = policy
//!     .execute(|_attempt| async { Ok::<_, String>(42) }, |_err| true)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::RetryPolicy;
