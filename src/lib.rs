pub mod adk;
pub mod tollgate;
