pub mod console;
pub mod machine;

pub use console::{Console, StdConsole};
pub use machine::{AbortHandle, CpmMachine};
