use thiserror::Error;

/// Errors raised by the HTTP clients before the caller degrades them
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Rate limited by {provider} (429)")]
    RateLimited { provider: &'static str },

    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
}

impl ApiError {
    /// Whether the price feed should try again after this failure.
    ///
    /// Server errors and transport failures are transient. Client errors and
    /// undecodable bodies will not fix themselves.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => !e.is_decode(),
            ApiError::Status { status, .. } => (500..600).contains(status),
            ApiError::RateLimited { .. } | ApiError::Decode { .. } => false,
        }
    }
}

/// Guards on balance and position settlement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    #[error("{0} is not a watched symbol")]
    UnknownSymbol(String),

    #[error("Invalid price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("Insufficient balance. Required: ${required:.2}, Available: ${available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Already have open position for {0}")]
    AlreadyHeld(String),

    #[error("No open position for {0}")]
    NotHeld(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: &'static str, message: String },
}

#[derive(Error, Debug)]
pub enum TradeLogError {
    #[error("Trade log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trade log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum BacktestError {
    #[error("Not enough price frames for backtest. Need {needed}, got {got}")]
    NotEnoughData { needed: usize, got: usize },
}
