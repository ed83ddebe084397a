//! SBS-1 BaseStation protocol support: the line parser and the TCP client
//! that feeds the tracker.

pub mod client;
pub mod parser;

pub use client::{SbsClient, SbsClientConfig};
pub use parser::{SBS_FIELD_COUNT, SbsError, SbsEvent, parse_line};
