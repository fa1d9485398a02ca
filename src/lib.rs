pub mod app;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod preview;
pub mod source;

#[cfg(test)]
mod testing;
