pub mod health;
pub mod probe;
pub mod system;
