pub mod catalog;
pub mod dataset;

pub use catalog::{Catalog, Lookup};
pub use dataset::{load_csv, read_csv};
