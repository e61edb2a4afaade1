//! # Narration
//!
//! The streaming tour guide: a narrator writes the tour fragment by fragment,
//! an auditor scores it against the real residents, and both travel over one
//! ordered stream.
//!
//! ```text
//! LocationDescriptor
//!   └── NarrationPipeline
//!         ├── TextGenerator ──fragments──▶ channel ──▶ framer ──▶ caller
//!         └── ConsistencyEvaluator ──verdict (last)──┘
//! ```

pub mod evaluator;
pub mod framer;
pub mod generator;
pub mod pipeline;
pub mod prompts;
pub mod types;

pub use evaluator::{ConsistencyEvaluator, StructuredJudge};
pub use framer::{
    encode_event, DecodedNarration, DecoderPhase, EvaluationOutcome, StreamDecoder, SENTINEL,
};
pub use generator::{ChatNarrator, FragmentStream, TextGenerator};
pub use pipeline::{
    NarrationHandle, NarrationItem, NarrationPipeline, PipelineStage, RunOutcome, RunReport,
};
pub use types::{EvaluationVerdict, FramedEvent, LocationDescriptor, NarrationError, ResidentRef};
