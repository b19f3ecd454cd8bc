mod column;
mod entry;
mod entry_id;
mod mark;
mod page_range;

pub use column::{Column, ColumnSchema, ColumnType, NumberOptions, SchemaDecodeError, TEXT_MAX_CHARS};
pub use entry::{Entry, EntryField, FieldValue, SignField};
pub use entry_id::EntryId;
pub use mark::Mark;
pub use page_range::{selectable_pages, PageRange, FIRST_PAGE, LAST_PAGE};
