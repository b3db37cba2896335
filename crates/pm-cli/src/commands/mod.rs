//! Command implementations.

pub mod challenge;
pub mod check;
pub mod password;

pub use challenge::{run_challenge, run_set_answers, run_verify_answer};
pub use check::run_check;
pub use password::{run_change_password, run_reset_password, run_set_password};
