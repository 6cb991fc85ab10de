//! Error kind discriminators.
//!
//! Every [`ServiceError`](crate::ServiceError) carries exactly one
//! [`ErrorKind`], fixed at construction. The translator branches on the kind,
//! never on message text or type names.
//!
//! # Stability
//!
//! `as_str()` tokens are part of the logging contract and must not change
//! once shipped. New kinds are added either as a new variant here or, from
//! downstream crates, through [`ErrorKind::Custom`]. Both fall through to the
//! translator's default status until explicitly mapped.
//!
//! ```rust
//! use ingress_errors::ErrorKind;
//!
//! assert_eq!(ErrorKind::VerifySignature.as_str(), "VerifySignatureError");
//! assert_eq!(ErrorKind::Custom("DynamoDbError").as_str(), "DynamoDbError");
//! ```

use serde::{Serialize, Serializer};
use std::fmt;

/// Discriminator identifying which taxonomy variant an error belongs to.
///
/// # Copy Semantics
///
/// Small, immutable classification data. Cheap to pass by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Generic classified failure with operation/context metadata.
    #[default]
    Common,
    /// Inbound request authentication or signature check failed.
    VerifySignature,
    /// Upstream queue service (SQS) failed.
    AwsSqsService,
    /// Downstream-defined kind. The name is the stable token.
    Custom(&'static str),
}

impl ErrorKind {
    /// Stable token for this kind.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "CommonError",
            Self::VerifySignature => "VerifySignatureError",
            Self::AwsSqsService => "AwsSqsServiceError",
            Self::Custom(name) => *name,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
