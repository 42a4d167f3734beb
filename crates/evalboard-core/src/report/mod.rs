pub mod console;
pub mod style;
pub mod xlsx;
