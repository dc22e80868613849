//! Chunk extraction: source files → ordered semantic spans.

mod extractor;
mod regex_rules;

pub use extractor::ChunkExtractor;
pub use extractor::ExtractionMode;
pub use regex_rules::extract_spans;
pub use regex_rules::RegexSpan;
