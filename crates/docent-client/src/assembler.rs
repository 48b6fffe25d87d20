//! Client-side response reconstruction.
//!
//! Consumes protocol frames for the active exchange, grows the streaming
//! assistant message, and forwards newly completed sentence units exactly
//! once. The spoken cursor marks how much of the current message has
//! already been handed to the consumer; it never moves backwards within an
//! exchange and resets when the exchange ends.

use docent_core::conversation::{Conversation, Message};
use docent_core::protocol::ProtocolFrame;
use docent_core::session::SessionId;
use tracing::warn;

use crate::chunker::split_completed;
use crate::error::ClientError;

/// Per-conversation frame consumer.
///
/// The invariant this type maintains: across all units returned for one
/// exchange, their concatenation equals the terminal frame's content
/// exactly, with no gaps and no duplication.
pub struct ResponseAssembler {
    conversation: Conversation,
    cursor: usize,
    in_flight: bool,
}

impl ResponseAssembler {
    pub fn new(session: SessionId) -> Self {
        Self {
            conversation: Conversation::new(session),
            cursor: 0,
            in_flight: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether the input control should accept a new query.
    pub fn input_enabled(&self) -> bool {
        !self.in_flight
    }

    /// Record an outgoing query: appends the user message and the streaming
    /// assistant placeholder, and disables input until a terminal frame.
    pub fn begin_exchange(&mut self, query: &str) -> Result<(), ClientError> {
        if self.in_flight {
            return Err(ClientError::ExchangeInFlight);
        }
        self.conversation.push(Message::user(query));
        self.conversation.push(Message::assistant_placeholder());
        self.cursor = 0;
        self.in_flight = true;
        Ok(())
    }

    /// Abandon the active exchange (session teardown). Late frames for it
    /// are ignored from this point on.
    pub fn cancel_exchange(&mut self) {
        if !self.in_flight {
            return;
        }
        if let Some(message) = self.conversation.streaming_message_mut() {
            message.streaming = false;
        }
        self.cursor = 0;
        self.in_flight = false;
    }

    /// Apply one inbound frame, returning the units to forward to the
    /// consumer. Each unit is returned at most once, ever.
    pub fn apply_frame(&mut self, frame: ProtocolFrame) -> Vec<String> {
        if !self.in_flight {
            warn!("Ignoring frame with no exchange in flight");
            return Vec::new();
        }

        match frame {
            ProtocolFrame::Partial { full_response } => self.apply_partial(full_response),
            ProtocolFrame::Complete { content, sources } => self.apply_complete(content, sources),
            ProtocolFrame::Error { content } => {
                self.apply_error(content);
                Vec::new()
            }
        }
    }

    /// Treat a fallback answer as a synthetic immediate `Complete`.
    pub fn apply_fallback(&mut self, content: String, sources: Vec<String>) -> Vec<String> {
        self.apply_frame(ProtocolFrame::Complete { content, sources })
    }

    fn apply_partial(&mut self, full_response: String) -> Vec<String> {
        // The server sends the cumulative string, so this is a replacement.
        let new_text = match full_response.get(self.cursor..) {
            Some(tail) => tail.to_string(),
            None => {
                // A well-behaved server never retracts text; drop the frame.
                warn!(
                    cursor = self.cursor,
                    len = full_response.len(),
                    "Partial frame shorter than spoken cursor; ignoring"
                );
                String::new()
            }
        };

        if let Some(message) = self.conversation.streaming_message_mut() {
            message.text = full_response;
        }

        let outcome = split_completed(&new_text);
        self.cursor += outcome.consumed;
        outcome.units
    }

    fn apply_complete(&mut self, content: String, sources: Vec<String>) -> Vec<String> {
        let leftover = content.get(self.cursor..).unwrap_or_default().to_string();

        if let Some(message) = self.conversation.streaming_message_mut() {
            message.text = content;
            message.streaming = false;
            message.sources = Some(sources);
        }

        self.cursor = 0;
        self.in_flight = false;

        // No further text will arrive, so the tail needs no chunking.
        if leftover.is_empty() {
            Vec::new()
        } else {
            vec![leftover]
        }
    }

    fn apply_error(&mut self, content: String) {
        if let Some(message) = self.conversation.streaming_message_mut() {
            message.text = content;
            message.streaming = false;
            message.error = true;
        }
        // Partial spoken state is discarded.
        self.cursor = 0;
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(text: &str) -> ProtocolFrame {
        ProtocolFrame::Partial {
            full_response: text.to_string(),
        }
    }

    fn complete(text: &str) -> ProtocolFrame {
        ProtocolFrame::Complete {
            content: text.to_string(),
            sources: vec![],
        }
    }

    fn make_assembler() -> ResponseAssembler {
        let mut assembler = ResponseAssembler::new(SessionId::new("test"));
        assembler.begin_exchange("question").unwrap();
        assembler
    }

    #[test]
    fn test_scripted_sequence_exactly_once() {
        let mut assembler = make_assembler();
        let mut received = Vec::new();

        received.extend(assembler.apply_frame(partial("Hello")));
        received.extend(assembler.apply_frame(partial("Hello world. ")));
        received.extend(assembler.apply_frame(complete("Hello world. Bye.")));

        assert_eq!(received, vec!["Hello world. ".to_string(), "Bye.".to_string()]);
        assert_eq!(received.concat(), "Hello world. Bye.");
        assert!(assembler.input_enabled());
    }

    #[test]
    fn test_reconstruction_has_no_gaps_or_duplicates() {
        let full = "One sentence. Another one! And a question? Final words";
        let mut assembler = make_assembler();
        let mut received = Vec::new();

        // Feed progressively longer prefixes, sliced arbitrarily.
        for end in [4, 15, 20, 33, 44, full.len()] {
            received.extend(assembler.apply_frame(partial(&full[..end])));
        }
        received.extend(assembler.apply_frame(complete(full)));

        assert_eq!(received.concat(), full);
    }

    #[test]
    fn test_response_without_punctuation_arrives_at_complete() {
        let mut assembler = make_assembler();
        let units = assembler.apply_frame(partial("no punctuation here"));
        assert!(units.is_empty());

        let units = assembler.apply_frame(complete("no punctuation here at all"));
        assert_eq!(units, vec!["no punctuation here at all".to_string()]);
    }

    #[test]
    fn test_complete_with_nothing_left_over() {
        let mut assembler = make_assembler();
        let units = assembler.apply_frame(partial("All spoken. "));
        assert_eq!(units, vec!["All spoken. ".to_string()]);

        let units = assembler.apply_frame(complete("All spoken. "));
        assert!(units.is_empty());
        assert!(assembler.input_enabled());
    }

    #[test]
    fn test_partial_updates_message_text() {
        let mut assembler = make_assembler();
        assembler.apply_frame(partial("Growing"));
        assert_eq!(assembler.conversation().last().unwrap().text, "Growing");
        assert!(assembler.conversation().last().unwrap().streaming);

        assembler.apply_frame(partial("Growing more"));
        assert_eq!(assembler.conversation().last().unwrap().text, "Growing more");
    }

    #[test]
    fn test_complete_finalizes_message() {
        let mut assembler = make_assembler();
        assembler.apply_frame(partial("Answer. "));
        let units = assembler.apply_frame(ProtocolFrame::Complete {
            content: "Answer. Done.".to_string(),
            sources: vec!["Page 1 - guide.pdf".to_string()],
        });
        assert_eq!(units, vec!["Done.".to_string()]);

        let message = assembler.conversation().last().unwrap();
        assert!(!message.streaming);
        assert!(!message.error);
        assert_eq!(message.text, "Answer. Done.");
        assert_eq!(
            message.sources.as_deref(),
            Some(&["Page 1 - guide.pdf".to_string()][..])
        );
    }

    #[test]
    fn test_error_frame_discards_spoken_state() {
        let mut assembler = make_assembler();
        assembler.apply_frame(partial("Partial answer. "));
        let units = assembler.apply_frame(ProtocolFrame::Error {
            content: "something went wrong".to_string(),
        });
        assert!(units.is_empty());

        let message = assembler.conversation().last().unwrap();
        assert!(message.error);
        assert!(!message.streaming);
        assert_eq!(message.text, "something went wrong");
        assert!(assembler.input_enabled());
    }

    #[test]
    fn test_input_disabled_while_in_flight() {
        let mut assembler = make_assembler();
        assert!(!assembler.input_enabled());
        assert!(matches!(
            assembler.begin_exchange("second"),
            Err(ClientError::ExchangeInFlight)
        ));

        assembler.apply_frame(complete("done"));
        assert!(assembler.input_enabled());
        assert!(assembler.begin_exchange("second").is_ok());
    }

    #[test]
    fn test_frames_without_exchange_ignored() {
        let mut assembler = ResponseAssembler::new(SessionId::new("test"));
        let units = assembler.apply_frame(partial("late frame"));
        assert!(units.is_empty());
        assert!(assembler.conversation().messages.is_empty());
    }

    #[test]
    fn test_late_frames_after_cancel_ignored() {
        let mut assembler = make_assembler();
        assembler.apply_frame(partial("some text. "));
        assembler.cancel_exchange();

        let units = assembler.apply_frame(partial("some text. more text. "));
        assert!(units.is_empty());
        assert!(assembler.input_enabled());
    }

    #[test]
    fn test_retracting_partial_is_ignored() {
        let mut assembler = make_assembler();
        let units = assembler.apply_frame(partial("A full sentence. "));
        assert_eq!(units.len(), 1);

        // Shorter than the cursor: dropped, no units, no crash.
        let units = assembler.apply_frame(partial("A ful"));
        assert!(units.is_empty());

        let units = assembler.apply_frame(complete("A full sentence. Tail."));
        assert_eq!(units, vec!["Tail.".to_string()]);
    }

    #[test]
    fn test_second_exchange_cursor_resets() {
        let mut assembler = make_assembler();
        assembler.apply_frame(complete("First answer."));

        assembler.begin_exchange("next question").unwrap();
        let units = assembler.apply_frame(partial("Second answer. "));
        assert_eq!(units, vec!["Second answer. ".to_string()]);
        let units = assembler.apply_frame(complete("Second answer. Sure."));
        assert_eq!(units, vec!["Sure.".to_string()]);
    }

    #[test]
    fn test_chunker_extension_across_partials() {
        // "A. B? C" then the buffer grows by " C!" worth of text.
        let mut assembler = make_assembler();
        let units = assembler.apply_frame(partial("A. B? C"));
        assert_eq!(units, vec!["A. ".to_string(), "B? ".to_string()]);

        let units = assembler.apply_frame(complete("A. B? C!"));
        assert_eq!(units, vec!["C!".to_string()]);
    }

    #[test]
    fn test_fallback_equivalence() {
        // The fallback path must leave the conversation in the same final
        // state as streaming, modulo intermediate partial renders.
        let content = "Hello world. Bye.";
        let sources = vec!["Page 2 - faq.pdf".to_string()];

        let mut streamed = make_assembler();
        let mut streamed_units = Vec::new();
        streamed_units.extend(streamed.apply_frame(partial("Hello world. ")));
        streamed_units.extend(streamed.apply_frame(ProtocolFrame::Complete {
            content: content.to_string(),
            sources: sources.clone(),
        }));

        let mut fell_back = make_assembler();
        let fallback_units = fell_back.apply_fallback(content.to_string(), sources.clone());

        assert_eq!(streamed_units.concat(), fallback_units.concat());

        let a = streamed.conversation().last().unwrap();
        let b = fell_back.conversation().last().unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.sources, b.sources);
        assert_eq!(a.streaming, b.streaming);
        assert_eq!(a.error, b.error);
        assert!(streamed.input_enabled() && fell_back.input_enabled());
    }
}
