pub mod error;
pub mod scan;
pub mod stack;
pub mod registry;
pub mod interpreter;

pub use error::{Error, Result};
pub use interpreter::{DEFAULT_MEMORY_LEN, Interpreter, InterpreterConfig, RunStats};
pub use registry::{Machine, OperationHandler, Registry};
