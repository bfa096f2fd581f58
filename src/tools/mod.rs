//! Built-in tools the demos bind to the model.

pub mod calculator;
pub mod retrieval;
pub mod search;

pub use calculator::{arithmetic_toolkit, CalculatorTool};
pub use retrieval::{render_with_metadata, HitFormatter, RetrieverTool};
pub use search::{SearchResult, TavilySearchTool};
