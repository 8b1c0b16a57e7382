mod parser;
mod registry;

pub use parser::{checksum_16, KlvParseOutput, KlvParser, KlvSummary, UNIVERSAL_KEY};
pub use registry::{tag, FieldSpec, TagRegistry, TagValue};
