#[macro_use]
mod macros;

/// `$DATA` and `$TABLE` record handling
mod control;
pub use control::{add_path_level_to_data, find_output_files};

/// Model name sequences like `run[001:006].mod`
mod sequence;
pub use sequence::{expand_name_sequence, is_name_sequence, MAX_SEQUENCE_LEN};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid model name sequence '{pattern}': {msg}")]
    InvalidSequence { pattern: String, msg: String },
    #[error("Model name sequence '{0}' counts down; the end must not be smaller than the start")]
    DescendingSequence(String),
}

mod prelude {
    pub use combine::parser::char::{char, digit, string_cmp};
    pub use combine::parser::range::recognize;
    pub use combine::*;
}
