pub mod check;
pub mod completions;
pub mod reset;
pub mod status;
