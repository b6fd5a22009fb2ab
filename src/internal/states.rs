mod reactive_core;
pub mod unlock_reactive;
