use advisory_types::error::CallableError;

pub const MAX_TOPIC_LEN: usize = 900;

/// Topic names are 1..=900 characters drawn from `[A-Za-z0-9-_.~%]`.
pub fn validate(topic: &str) -> Result<(), CallableError> {
    if topic.is_empty() || topic.len() > MAX_TOPIC_LEN {
        return Err(CallableError::invalid_argument(format!(
            "Topic name must be between 1 and {} characters.",
            MAX_TOPIC_LEN
        )));
    }

    if let Some(bad) = topic.chars().find(|c| !is_topic_char(*c)) {
        return Err(CallableError::invalid_argument(format!(
            "Invalid character {:?} in topic name {:?}.",
            bad, topic
        )));
    }

    Ok(())
}

pub fn validate_all(topics: &[String]) -> Result<(), CallableError> {
    if topics.is_empty() {
        return Err(CallableError::invalid_argument("No topics given."));
    }
    topics.iter().try_for_each(|t| validate(t))
}

fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '%')
}
