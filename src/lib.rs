use std::error::Error;

pub mod aggregate;
pub mod backup;
pub mod config;
pub mod error;
pub mod hypothesis;
pub mod model;
pub mod render;
pub mod state;
pub mod sync;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
