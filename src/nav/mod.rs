pub mod flatten;
pub mod keys;
pub mod stack;
