use std::borrow::Cow;

/// The marker the tutor appends to its final message once the learner has
/// demonstrated mastery.
///
/// It is the only machine-readable signal of completion. Since it travels
/// inside free text, a reply that merely quotes the marker also counts as
/// complete.
pub const COMPLETION_SENTINEL: &str = "__COMPLETE__";

/// Removes the completion marker from a (cumulative) reply.
///
/// Returns the text to display and whether the marker was present. When it
/// is, the first occurrence is removed and the remaining text is trimmed;
/// otherwise the text is returned untouched.
pub fn strip_completion_sentinel(text: &str) -> (Cow<'_, str>, bool) {
    if !text.contains(COMPLETION_SENTINEL) {
        return (Cow::Borrowed(text), false);
    }
    let stripped = text.replacen(COMPLETION_SENTINEL, "", 1);
    (Cow::Owned(stripped.trim().to_owned()), true)
}
