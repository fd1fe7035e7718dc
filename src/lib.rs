//! Stacktrace enhancement rules for crash grouping.
//!
//! Rules written in a small line-oriented DSL decide, for every frame of a
//! crash stacktrace, whether it is application code, which category it
//! belongs to, and whether it contributes to the grouping identity.
//!
//! # Example
//!
//! ```no_run
//! use enhancers::{EngineConfig, Enhancer, ExceptionData, Frame, FrameComponent, GroupingVariant};
//!
//! let enhancer = Enhancer::new(EngineConfig::default())?;
//! let set = enhancer.from_config_string("path:**/vendor/** -app", ["newstyle:2023-01-11"], None)?;
//!
//! let mut frames: Vec<Frame> = serde_json::from_str(r#"[{"abs_path": "src/vendor/lib.py", "in_app": true}]"#)?;
//! set.apply_category_and_updated_in_app_to_frames(&mut frames, Some("python"), &ExceptionData::default());
//!
//! let components = frames.iter().map(|f| FrameComponent::for_frame(f, true)).collect();
//! let stacktrace = set.assemble_stacktrace_component(GroupingVariant::App, components, &frames, Some("python"), None);
//! println!("contributes: {}", stacktrace.contributes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bases;
pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod enhancements;
pub mod error;
pub mod matchers;
pub mod output;
pub mod profiling;
pub mod rules;
pub mod types;

// Re-export commonly used types at crate root
pub use bases::BaseRegistry;
pub use cache::{CacheStats, RuleCache};
pub use config::EngineConfig;
pub use enhancements::{Enhancements, EnhancementsDict, Enhancer};
pub use error::{EnhancerError, Result};
pub use profiling::keep_profiling_rules;
pub use rules::{parse_enhancements, Rule};
pub use types::{
    ExceptionData, Family, Frame, FrameComponent, FrameCounts, GroupingVariant, StackDirection,
    StacktraceComponent,
};
