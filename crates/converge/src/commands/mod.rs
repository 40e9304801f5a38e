pub mod mutate;
pub mod task;
pub mod wait;
