pub mod file_store;
pub mod protocol;
pub mod states;
pub mod transfer;
pub mod transport;
