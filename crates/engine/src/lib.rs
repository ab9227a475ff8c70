pub mod extractor;
pub mod heuristics;
pub mod pipeline;
pub mod registry;
pub mod sentinel;
pub mod session;

pub use pipeline::{APOLOGY_REPLY, EngineError, GRATITUDE_REPLY, ResponsePipeline};
pub use registry::ChatEngine;
pub use session::{CONTEXT_WINDOW_TURNS, Session};

#[cfg(test)]
mod test_support;
