pub mod args;
pub mod invocation;

pub use args::Cli;
pub use invocation::{decode_payload, encode_payload, Invocation, POSITIONAL_ARITY};
