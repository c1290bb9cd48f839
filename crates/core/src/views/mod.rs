pub mod layout;
pub mod pagination;
pub mod time_axis;

pub use layout::{TimelineLayout, layout_timeline};
pub use pagination::{PageNav, PageView, Pagination};
pub use time_axis::MarkerInterval;
