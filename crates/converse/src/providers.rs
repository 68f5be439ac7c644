pub mod base;
pub mod configs;
pub mod converse;

#[cfg(test)]
pub mod mock;
