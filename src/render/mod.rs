pub mod datetime;
pub mod html;
pub mod page;
pub mod value;

pub use datetime::{format_datetime, format_datetime_str};
pub use page::{client_script, Page};
pub use value::{field_value, render_value, RenderCache, RenderEnv, RenderedValue};
