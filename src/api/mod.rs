pub mod cryptocom;
pub mod openrouter;
pub mod telegram;

pub use cryptocom::{ClosePrice, CryptoComClient};
pub use openrouter::OpenRouterClient;
pub use telegram::TelegramClient;
