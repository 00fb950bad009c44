//! Repeat-token expansion
//!
//! A token ending in `x<count>` stands for `count` copies of the token with
//! the suffix removed: `"upx3"` becomes `"up", "up", "up"`.

use automator_core::Action;
use regex::Regex;
use std::sync::OnceLock;

static REPEAT_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn repeat_suffix() -> &'static Regex {
    REPEAT_SUFFIX.get_or_init(|| Regex::new(r"^(.*)x(\d+)$").expect("static pattern compiles"))
}

/// Split a token into its base text and repeat count
///
/// Returns `None` when the token has no `x<digits>` suffix or the digits do
/// not fit in a `usize`; such tokens are used literally.
pub fn parse_repeat(token: &str) -> Option<(&str, usize)> {
    let captures = repeat_suffix().captures(token)?;
    let count = captures.get(2)?.as_str().parse().ok()?;
    let base = captures.get(1)?.as_str();
    Some((base, count))
}

/// Expand repeat tokens into a flat sequence
///
/// Non-token actions and tokens without a repeat suffix pass through in
/// order. A count of zero removes the token entirely.
pub fn expand_actions(actions: Vec<Action>) -> Vec<Action> {
    let mut expanded = Vec::with_capacity(actions.len());

    for action in actions {
        if let Some(token) = action.as_key() {
            if let Some((base, count)) = parse_repeat(token) {
                expanded.extend(std::iter::repeat_with(|| Action::key(base)).take(count));
                continue;
            }
        }
        expanded.push(action);
    }

    expanded
}
