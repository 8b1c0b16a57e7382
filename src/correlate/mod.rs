mod correlator;

pub use correlator::{CorrelationOutput, CorrelationSummary, CorrelatorConfig, GeoCorrelator};
