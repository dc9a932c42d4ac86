pub mod line;
pub mod paragraph;
pub mod split;

pub use line::{parse_config, parse_func, parse_line};
pub use paragraph::{ControlBlock, Paragraph};
pub use split::{smart_index_of, split_with};
