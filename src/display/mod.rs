//! Widget state for showing arbitrary JSON: tables of uniform records and
//! labelled key/value objects. Drawing lives in `crate::ui`.

pub mod key_value;
pub mod table;
pub mod value;

pub use key_value::KeyValueDisplay;
pub use table::{records_value, DisplayTable, Record};
pub use value::{format_value, input_shape, parse_cell_input, InputShape};
