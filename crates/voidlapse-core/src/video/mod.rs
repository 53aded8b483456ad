pub mod extract;
pub mod frame;
pub mod probe;
