pub mod events_handler;
pub mod index_handler;
