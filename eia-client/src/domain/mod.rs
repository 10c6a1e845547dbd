mod live_sample;
mod record;
mod source;

pub use live_sample::LiveGenerationSample;
pub use record::{GeneratorCapacity, Record};
pub use source::SourceCategory;
