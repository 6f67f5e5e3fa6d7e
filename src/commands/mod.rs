pub mod dashboard;
pub mod run;
pub mod utils;
pub mod wait;

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;
