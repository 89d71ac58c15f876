//! Compiler-argument handling: shell tokenization of `command` strings and the adjustment of
//! build arguments for semantic editor functionality.

pub mod adjust;
pub mod shell;

pub use adjust::adjust_compiler_arguments;
pub use shell::{split_shell_command, split_posix_command, split_windows_command};
