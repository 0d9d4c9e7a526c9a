use super::validate::CallOptions;
use crate::error::AiHeroError;

/// Turn a failed response into exactly one error.
///
/// Resolution order: an override from `network_errors` plus the body, then
/// the generic `error_msg` plus the body, then `error_msg` alone when there is
/// no status at all.
pub fn classify(status: Option<u16>, body: &str, options: &CallOptions) -> AiHeroError {
    let Some(status) = status else {
        return AiHeroError::Transport {
            message: options.error_msg.clone(),
            source: None,
        };
    };

    let message = match options.network_errors.get(&status) {
        Some(reason) => format!("{}: {reason} - {body}", options.error_msg),
        None => format!("{} - {body}", options.error_msg),
    };
    AiHeroError::RemoteStatus { status, message }
}
