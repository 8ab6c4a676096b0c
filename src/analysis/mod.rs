pub mod aggregator;
pub mod modeler;

pub use aggregator::*;
pub use modeler::*;
