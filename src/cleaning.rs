pub mod keys;
pub mod reference;
pub mod rules;
pub mod shape;
