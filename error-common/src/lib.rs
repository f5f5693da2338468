//! Common error handling utilities for the HyperIoT permission platform
//!
//! This module provides the error vocabulary shared by the permission crates:
//! stable error codes and a classification telling callers whether an error
//! is an expected denial or a fault that must abort the request.
//!
//! # Error Categories
//!
//! - **Denial**: inactive account, missing permission bit, wrong owner
//! - **NotFound**: the persistence collaborator has no such record
//! - **Integrity**: broken ownership chains, attempted reparenting
//! - **Registry**: duplicate, exhausted or unknown actions
//! - **Configuration**: unreadable or inconsistent policy tables
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, CodedError, ErrorCategory};
//!
//! struct Inactive;
//!
//! impl CodedError for Inactive {
//!     fn code(&self) -> &'static str {
//!         codes::authorization::ACCOUNT_INACTIVE
//!     }
//!
//!     fn category(&self) -> ErrorCategory {
//!         ErrorCategory::Denial
//!     }
//! }
//!
//! assert!(!Inactive.is_server_fault());
//! ```

pub mod codes;
pub mod types;

pub use types::*;
