//! Formatting helpers for binary values and wire dumps.
//!
//! ```
//! use async_dmconfig::format::hex;
//!
//! assert_eq!(hex::encode(&[0x01, 0xab]), "01ab");
//! ```

pub mod hex;
