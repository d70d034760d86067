pub mod normalize;
pub mod result;

pub use normalize::{normalize, ResultProfile};
pub use result::{CellValue, QueryResult};
