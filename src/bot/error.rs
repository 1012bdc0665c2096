/// An Error returned by the [Bot](super::Bot) loop.
#[derive(Debug)]
pub enum BotError {
    /// The listener's event stream was already taken by another consumer.
    EventStreamTaken,
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::EventStreamTaken => {
                f.write_str("The listener's event stream is already being consumed.")
            }
        }
    }
}
impl std::error::Error for BotError {}
