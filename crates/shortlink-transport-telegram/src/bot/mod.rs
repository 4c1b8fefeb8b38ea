/// Command and message handlers
pub mod handlers;
/// Reply rendering
pub mod views;
