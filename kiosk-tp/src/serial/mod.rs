//! Serial tag reader
//!
//! The NFC reader prints human-readable lines over a USB serial link. Scan
//! records carry the tag identifier after a literal `UID Value:` marker and
//! end with CRLF:
//!
//! ```text
//! UID Value: 04 A3 1B 22\r\n
//! ```

pub mod parser;
pub mod source;

pub use parser::{parse_chunk, TagReader, TagScan, UID_MARKER};
pub use source::{pump_scans, PortOpener, SerialError, SerialPortOpener};
