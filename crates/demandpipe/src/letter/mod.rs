//! Demand letter generation: JSON case metadata in, DOCX out.

pub mod docx;
pub mod error;
pub mod generator;
pub mod metadata;

pub use docx::{Alignment, Block, DocxWriter, Paragraph, Run};
pub use error::LetterError;
pub use generator::{generate_letter, DemandLetter};
pub use metadata::{load_metadata, InsuranceContact, LetterMetadata, MedicalRecord};
