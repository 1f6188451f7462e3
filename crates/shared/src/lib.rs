pub mod domain;
pub mod error;
pub mod natural;
pub mod protocol;
