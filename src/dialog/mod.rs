pub mod message_dialog;
pub mod query_builder_dialog;

pub use message_dialog::MessageDialog;
pub use query_builder_dialog::QueryBuilderDialog;
