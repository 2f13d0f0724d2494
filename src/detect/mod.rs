pub mod ocr;
pub mod preprocess;
pub mod qr;

pub use ocr::{best_token, extract_text, TesseractCli, TesseractConfig, TextRecognizer};
pub use preprocess::prepare_for_recognition;
pub use qr::{decode, QrDecoder, StructuredDecoder};
