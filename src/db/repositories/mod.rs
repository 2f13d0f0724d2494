pub mod scanned_codes;
