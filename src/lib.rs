// Export modules for use in tests and the binary
pub mod bus;
pub mod converter;
pub mod document;
pub mod generator;
pub mod layout;
pub mod model;
pub mod notification;
pub mod outline;
pub mod panic_handler;
pub mod render;
pub mod session;
pub mod settings;
pub mod synopsis;
pub mod viewport;

pub use document::{Document, DocumentRequest, DocumentSource};
pub use generator::{GeneratorError, GeneratorSettings, TextDocumentGenerator};
pub use outline::{OutlineEffect, OutlineTree};
pub use session::Session;
pub use viewport::Viewport;
