pub mod scanned_code;

pub use scanned_code::CodeRecord;
