pub mod program;

pub use program::{Program, ProgramError};
