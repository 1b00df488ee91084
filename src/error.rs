#[derive(Debug, thiserror::Error)]
pub enum NatstatError {
    #[error("cannot open control device {path}: {source}")]
    ChannelUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot push STREAMS module {module}: {source}")]
    ModuleStack {
        module: String,
        #[source]
        source: std::io::Error,
    },
    #[error("putmsg of option management request failed: {0}")]
    RequestSend(#[source] std::io::Error),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("deadline exceeded after {messages} reply message(s)")]
    DeadlineExceeded { messages: usize },
    #[error("drain budget exhausted after {messages} reply message(s)")]
    BudgetExhausted { messages: usize },
    #[error("serialization error: {0}")]
    Serialization(#[source] std::io::Error),
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(&'static str),
}
