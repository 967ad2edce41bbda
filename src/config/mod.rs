pub mod settings;

pub use settings::{Plan, Settings};
