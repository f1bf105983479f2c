pub mod known;
pub mod types;

pub use known::{KnownParameter, ValueDomain};
pub use types::{ConfigTriple, Parameter, ParameterContent};
