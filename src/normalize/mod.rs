pub mod nutrients;
pub mod values;

pub use nutrients::extract_calories;
pub use values::{to_optional_float, to_optional_int, to_optional_text};
