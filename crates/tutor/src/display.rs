use std::mem;

use tutor_protocol::COMPLETION_SENTINEL;

/// What to write to the terminal for a tutor turn that just changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyOutput {
    /// Write this text right after what is already on screen.
    Append(String),
    /// The text on screen is stale. Start a new line with the whole reply.
    Redraw(String),
}

/// Turns successive versions of a streaming tutor turn into terminal
/// output that never shows any part of the completion marker.
///
/// A tail that could be the start of [`COMPLETION_SENTINEL`] is held back
/// until the next version shows whether it is. Once the marker arrives,
/// the stored turn is trimmed, which is not reprinted.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    printed: String,
    held: String,
}

impl ReplyPrinter {
    /// Creates a printer for a reply that has shown nothing yet.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the latest content of the turn and returns what to write, if
    /// anything.
    pub fn update(&mut self, content: &str) -> Option<ReplyOutput> {
        let (shown, held) =
            content.split_at(content.len() - partial_sentinel_len(content));
        self.held = held.to_owned();

        if let Some(rest) = shown.strip_prefix(self.printed.as_str()) {
            if rest.is_empty() {
                return None;
            }
            self.printed.push_str(rest);
            return Some(ReplyOutput::Append(rest.to_owned()));
        }
        if self.printed.starts_with(shown) {
            return None;
        }
        self.printed = shown.to_owned();
        Some(ReplyOutput::Redraw(self.printed.clone()))
    }

    /// Releases text held back at the end of the reply. It turned out not
    /// to be the marker.
    pub fn finish(&mut self) -> Option<ReplyOutput> {
        let held = mem::take(&mut self.held);
        if held.is_empty() {
            return None;
        }
        self.printed.push_str(&held);
        Some(ReplyOutput::Append(held))
    }
}

/// Length of the longest proper prefix of the marker that `text` ends with.
fn partial_sentinel_len(text: &str) -> usize {
    (1..COMPLETION_SENTINEL.len())
        .rev()
        .find(|len| text.ends_with(&COMPLETION_SENTINEL[..*len]))
        .unwrap_or(0)
}
