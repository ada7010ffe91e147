mod env;
mod labels;
pub mod seed;

pub use env::Value;
pub use labels::column_label;
