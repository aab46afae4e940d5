//! Answer generation over retrieved page images

mod answer;
pub mod prompt;

pub use answer::{Answer, AnswerGenerator};
