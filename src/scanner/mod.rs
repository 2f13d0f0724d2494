pub mod controller;
pub mod cycle;
pub mod error;
pub mod session;
pub mod state;

pub use controller::ScanController;
pub use cycle::{resolve_candidate, scan_frame};
pub use error::ScanError;
pub use session::ScanSession;
pub use state::{Candidate, CandidateSource, FoundOutcome, ScanSnapshot, ScanState, StatusKind};
