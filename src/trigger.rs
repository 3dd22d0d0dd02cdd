//! Decides whether a normalized message is addressed to the bot and pulls
//! out the question.
//!
//! Both detectors are pure: no I/O and no failure mode beyond `None`.

/// Prefix that marks a private message as a question.
pub const PRIVATE_PREFIX: &str = "#QA";

/// Group messages trigger when they mention the bot.
///
/// Accepted mention encodings for bot id `N`: `[AT:N]` (canonical),
/// `[CQ:at,qq=N]` (CQ-code encoders) and a bare `@`. All of them are
/// stripped from the question; a plain-text `@N` goes as a whole. A zero
/// `bot_self_id` never triggers, and a mention with nothing else left is
/// not a question.
pub fn detect_group_trigger(text: &str, bot_self_id: i64) -> Option<String> {
    if bot_self_id == 0 {
        return None;
    }

    let tokens = bracketed_tokens(bot_self_id);
    let mentioned =
        text.contains(BARE_MENTION) || tokens.iter().any(|t| text.contains(t.as_str()));
    if !mentioned {
        return None;
    }

    let mut question = text.to_string();
    for token in &tokens {
        question = question.replace(token.as_str(), "");
    }
    question = strip_plain_mention(&question, &format!("{BARE_MENTION}{bot_self_id}"));
    question = question.replace(BARE_MENTION, "");

    non_empty(question.trim())
}

/// Private messages trigger when, after leading whitespace, they start with
/// `#QA` in any letter case.
pub fn detect_private_trigger(text: &str) -> Option<String> {
    let text = text.trim_start();
    let prefix = text.get(..PRIVATE_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(PRIVATE_PREFIX) {
        return None;
    }
    non_empty(text[PRIVATE_PREFIX.len()..].trim())
}

/// Bare mention character.
const BARE_MENTION: char = '@';

/// Bracketed encodings end in `]`, so any match is a complete mention.
fn bracketed_tokens(bot_self_id: i64) -> [String; 2] {
    [
        format!("[AT:{bot_self_id}]"),
        format!("[CQ:at,qq={bot_self_id}]"),
    ]
}

/// Remove `@N` where it is not followed by further digits (`@123` must not
/// eat the prefix of `@1234`).
fn strip_plain_mention(text: &str, token: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(token) {
        let end = pos + token.len();
        if rest[end..].starts_with(|c: char| c.is_ascii_digit()) {
            out.push_str(&rest[..end]);
        } else {
            out.push_str(&rest[..pos]);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
