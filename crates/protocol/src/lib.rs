//! # Geotrail Protocol
//!
//! Wire format shared by the transport, the router and the ingestion worker.
//!
//! ## Framing
//!
//! ```text
//! 0000{"targetId":"a1","location":{"coordinates":[-122.4,37.7],"time":"2016-03-01T10:00:00Z"}}
//! ^^^^ zero-padded channel prefix (default width 4)
//!     ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ payload
//! ```
//!
//! ## Example
//!
//! ```rust
//! use geotrail_protocol::{compose, parse_record, split_prefix};
//!
//! let raw = r#"0000{"targetId":"a1","location":{"coordinates":[-122.4,37.7],"time":"2016-03-01T10:00:00Z"}}"#;
//! let (prefix, payload) = split_prefix(raw, 4).unwrap();
//! let record = parse_record(payload).unwrap();
//! assert_eq!(record.target_id, "a1");
//!
//! let frame = compose(prefix, &record).unwrap();
//! let (_, echoed) = split_prefix(&frame, 4).unwrap();
//! assert_eq!(parse_record(echoed).unwrap(), record);
//! ```

mod error;
mod framing;
mod record;

pub use error::{ProtocolError, Result};
pub use framing::{
    check_len, compose, format_prefix, prefix_capacity, split_prefix, DEFAULT_MAX_MESSAGE_LEN,
    DEFAULT_PREFIX_WIDTH, STATUS_CHECK,
};
pub use record::{
    parse_record, validate_target_id, Coordinates, Location, WireRecord, MAX_TARGET_ID_LEN,
    MISSING_ALTITUDE,
};
