//! Filesystem operations: modularized.
//!
//! Every relocation the agent performs (input -> destination, input -> waiting,
//! waiting -> destination, anything -> error) goes through [`move_file`].

mod atomic;
mod copy;
mod duplicate;
mod file_move;
mod helpers;
mod util;

pub use atomic::try_atomic_move;
pub use duplicate::{OnCollision, resolve_destination};
pub use file_move::{move_file, rename_in_place};
pub use helpers::{io_error_with_help, io_error_with_help_io};
pub(crate) use util::is_internal_name;
