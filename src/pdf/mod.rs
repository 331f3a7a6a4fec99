pub mod document;
pub mod fonts;
pub mod images;
pub mod inspect;
pub mod layout;
pub mod markup;
pub mod style;
pub mod subset;
pub mod writer;

pub use document::DocumentConverter;
pub use inspect::page_text;
