//! Tabular export formats.

pub mod csv_utils;

pub use csv_utils::{contacts_to_csv, parse_contacts_csv};
