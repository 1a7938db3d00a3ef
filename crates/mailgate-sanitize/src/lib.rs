//! # mailgate-sanitize
//!
//! Pure sanitizers for outbound mail input: subject scrubbing, an HTML
//! whitelist filter, file name normalization, and address validation.
//!
//! All functions are deterministic and idempotent; none perform I/O.
//!
//! ## Example
//!
//! ```ignore
//! use mailgate_sanitize::{sanitize_subject, is_valid_address};
//!
//! assert_eq!(sanitize_subject("Hi\r\nthere  "), "Hithere");
//! assert!(is_valid_address("user@example.com"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod filename;
mod html;
mod subject;

pub use address::is_valid_address;
pub use filename::sanitize_filename;
pub use html::sanitize_html;
pub use subject::sanitize_subject;
