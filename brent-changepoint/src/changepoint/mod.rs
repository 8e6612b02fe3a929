//! Change point records derived from the inference posterior.

pub mod summarizer;

pub use summarizer::{ChangePoint, PosteriorSummarizer, SummarizerConfig};
