pub mod project;

pub use project::{en, init_test_logging, ws, TestProject, ANALYSIS_WS, VERNACULAR_WS};
