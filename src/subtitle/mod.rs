mod parser;

pub use parser::{SubtitleParseOutput, SubtitleSummary, SubtitleTelemetryParser};
