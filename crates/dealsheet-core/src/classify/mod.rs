pub mod engine;
pub mod outcome;

pub use engine::{classify_sheet, classify_sheets};
pub use outcome::{SheetClassification, VocabularyScore};
