pub mod record;
pub mod recommendation;

pub use record::{Column, Dataset, FinancialRecord, Month};
pub use recommendation::Recommendation;
