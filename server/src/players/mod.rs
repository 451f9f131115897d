pub mod answers;
pub mod join;
