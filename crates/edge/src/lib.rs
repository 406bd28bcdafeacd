pub mod cli;
pub mod layout;
pub mod output;

mod error;

pub use error::Error;
