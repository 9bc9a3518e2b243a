//! Style descriptors, fonts, and their resolution into concrete per-page-size styles.

pub mod colour;
pub mod descriptor;
pub mod fonts;
pub mod metrics;
pub mod page_size;
pub mod resolver;

pub use colour::Colour;
pub use descriptor::StyleDescriptor;
pub use page_size::{Margins, PageGeometry, PageSize};
pub use resolver::{
    Alignment, Divider, Frame, ResolvedStyle, RuleKind, StyleResolver, TextStyle,
};
