use std::sync::OnceLock;

use regex::{Captures, Regex};

fn channel_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // `#` must start the text or follow a character that can't end a word or
    // URL path, so `page#faq` stays as written.
    PATTERN.get_or_init(|| {
        Regex::new(r"(^|[^\w/#])#([A-Za-z0-9_-]+)").expect("static pattern compiles")
    })
}

/// Rewrites every `#name` in `text` that `lookup` resolves into Slack's
/// `<#ID|name>` channel markup.
///
/// Channel names are lowercase, so a token with any uppercase letter (a
/// `#HASHTAGSCREAMING`) is never treated as a reference. Tokens `lookup`
/// doesn't know are left as written.
pub fn add_channel_markup<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    channel_reference()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[2];
            if name.chars().any(|c| c.is_ascii_uppercase()) {
                return caps[0].to_string();
            }
            match lookup(name) {
                Some(markup) => format!("{}{markup}", &caps[1]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
