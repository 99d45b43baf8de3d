pub mod engine;
pub mod pipeline;

pub use engine::{EngineConfig, EngineError, EngineStatus, TradingEngine};
pub use pipeline::{PipelineConfig, SwapPipeline};
