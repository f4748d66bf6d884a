//! Shared helpers: filesystem, process execution, retries and locking.

pub mod fs;
pub mod lock;
pub mod process;
pub mod retry;

pub use lock::RunLock;
pub use process::{SystemRunner, ToolCommand, ToolOutput, ToolRunner, run_checked};
pub use retry::{Attempt, RetryPolicy, retry_while_busy};
