/*!
 * The translation pipeline.
 *
 * Submodules cover the stages in execution order: `request` plans batches
 * and fingerprints, `context` carries the rolling dialogue window,
 * `dispatch` and `breaker` guard the provider, `validator` enforces the
 * roster, `assembler` renders the output, and `orchestrator` ties them
 * together into one job.
 */

pub mod assembler;
pub mod breaker;
pub mod context;
pub mod dispatch;
pub mod orchestrator;
pub mod request;
pub mod validator;

pub use assembler::{AssemblySummary, OutputAssembler};
pub use breaker::CircuitBreaker;
pub use context::{ContextPair, ContextSnapshot, ContextWindowManager};
pub use dispatch::{Dispatcher, RetryState};
pub use orchestrator::{JobReport, TranslationEngine};
pub use request::{BatchEntry, RequestBuilder};
pub use validator::{ConsistencyValidator, Violation};
