pub mod client;

pub use client::{ClassifierClient, ClassifierError};
