pub mod features;
pub mod migrate;
pub mod session;
