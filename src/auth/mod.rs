//! Authentication primitives: password hashing, one-time codes, signed
//! tokens and user-agent parsing for session descriptors.

pub mod device;
pub mod otp;
pub mod password;
pub mod tokens;

pub use device::{describe_user_agent, DeviceInfo, DeviceType};
pub use otp::{OtpError, OtpGenerator};
pub use password::{hash_password, verify_password};
pub use tokens::{AccessClaims, RefreshClaims, TokenError, TokenIssuer, TokenKind};
