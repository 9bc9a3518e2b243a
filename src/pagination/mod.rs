//! Page estimates and the partitioning of chapters into bounded parts.

mod estimate;
pub use estimate::*;

mod partition;
pub use partition::*;
