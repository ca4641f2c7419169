/// Dispatcher endpoints
pub mod handlers;
/// Sending with retry and plain-text fallback
pub mod resilient;
/// `ChatTransport` implementation over the Bot API
pub mod transport;
/// Inline keyboards
pub mod views;

pub use transport::TelegramTransport;
