pub mod error;
pub mod ident;
pub mod statement;
pub mod value;

pub use error::GalError;
pub use ident::{is_discard_name, is_identifier};
pub use statement::*;
pub use value::*;
