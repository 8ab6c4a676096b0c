pub mod column_cleaner;
pub mod feature_deriver;

pub use column_cleaner::*;
pub use feature_deriver::*;
