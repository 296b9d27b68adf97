//! Property-based tests for the reconciler.
//!
//! Random event sequences, including events of streams that were disregarded
//! by a reset, must never break the transcript invariants.

use proptest::prelude::*;
use tutor_protocol::{COMPLETION_SENTINEL, Role, decode_transcript};

use super::*;
use crate::storage::{MemoryStorage, Storage};
use crate::transcript::STORAGE_KEY;

#[derive(Clone, Debug)]
enum Event {
    Submit(String),
    Started(usize),
    Chunk(usize, String),
    Finish(usize, bool),
    Reset,
}

fn arb_reply() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ,.?]{0,40}",
        "[a-zA-Z ]{0,20}".prop_map(|s| format!("{s} {COMPLETION_SENTINEL}")),
    ]
}

/// Streams are addressed by the order they were started in, so events of
/// old streams replay against whatever the reconciler is doing now.
fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => "[ a-z?]{0,12}".prop_map(Event::Submit),
        1 => (0usize..8).prop_map(Event::Started),
        4 => ((0usize..8), arb_reply())
            .prop_map(|(stream, text)| Event::Chunk(stream, text)),
        2 => ((0usize..8), any::<bool>())
            .prop_map(|(stream, ok)| Event::Finish(stream, ok)),
        1 => Just(Event::Reset),
    ]
}

fn persisted(storage: &MemoryStorage) -> Vec<ChatTurn> {
    storage
        .get(STORAGE_KEY)
        .unwrap()
        .map(|json| decode_transcript(&json).unwrap())
        .unwrap_or_default()
}

fn check_invariants(reconciler: &Reconciler, storage: &MemoryStorage) {
    let transcript = reconciler.transcript();
    assert_eq!(persisted(storage), transcript);
    assert_eq!(transcript.len() % 2, 0);
    for pair in transcript.chunks(2) {
        assert_eq!(pair[0].role, Role::Learner);
        assert_eq!(pair[1].role, Role::Tutor);
    }
    if let Some(cursor) = reconciler.cursor() {
        assert_eq!(cursor.index(), transcript.len() - 1);
    }
}

proptest! {
    #[test]
    fn prop_transcript_stays_consistent(
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let storage = MemoryStorage::new();
        let mut reconciler =
            Reconciler::new(TranscriptStore::load(storage.clone()));
        let mut streams: Vec<StreamCursor> = vec![];

        for event in events {
            match event {
                Event::Submit(text) => {
                    let streaming = reconciler.is_streaming();
                    let len = reconciler.transcript().len();
                    match reconciler.submit(&text).unwrap() {
                        Some(pending) => {
                            prop_assert!(!streaming);
                            prop_assert_eq!(
                                reconciler.transcript().len(),
                                len + 2
                            );
                            streams.push(pending.cursor);
                        }
                        None => {
                            prop_assert!(
                                streaming || text.trim().is_empty()
                            );
                            prop_assert_eq!(
                                reconciler.transcript().len(),
                                len
                            );
                        }
                    }
                }
                Event::Started(stream) => {
                    if let Some(cursor) = streams.get(stream) {
                        if reconciler.response_started(*cursor) {
                            prop_assert_eq!(
                                reconciler.mode(),
                                UiMode::Conversing
                            );
                        }
                    }
                }
                Event::Chunk(stream, text) => {
                    let Some(cursor) = streams.get(stream).copied() else {
                        continue;
                    };
                    let before = reconciler.transcript().to_vec();
                    let applied =
                        reconciler.apply_chunk(cursor, &text).unwrap();
                    if applied {
                        let shown = &reconciler.transcript()[cursor.index()];
                        prop_assert!(
                            !shown.content.contains(COMPLETION_SENTINEL)
                                || text.matches(COMPLETION_SENTINEL).count()
                                    > 1
                        );
                        if text.contains(COMPLETION_SENTINEL) {
                            prop_assert_eq!(
                                reconciler.mode(),
                                UiMode::Finished
                            );
                        }
                    } else {
                        prop_assert_eq!(reconciler.transcript(), before.as_slice());
                    }
                }
                Event::Finish(stream, ok) => {
                    let Some(cursor) = streams.get(stream).copied() else {
                        continue;
                    };
                    let outcome = if ok {
                        Ok(())
                    } else {
                        Err("Error generating tutor reply: boom".to_owned())
                    };
                    let before = reconciler.transcript().to_vec();
                    reconciler.finish(cursor, outcome);
                    prop_assert_eq!(reconciler.transcript(), before.as_slice());
                    prop_assert_ne!(reconciler.cursor(), Some(cursor));
                }
                Event::Reset => {
                    reconciler.reset();
                    prop_assert!(reconciler.transcript().is_empty());
                    prop_assert_eq!(reconciler.mode(), UiMode::Conversing);
                    prop_assert_eq!(storage.get(STORAGE_KEY).unwrap(), None);
                }
            }
            check_invariants(&reconciler, &storage);
        }
    }

    #[test]
    fn prop_apply_chunk_idempotent(
        answer in "[a-zA-Z ?]{1,20}",
        reply in arb_reply(),
    ) {
        let storage = MemoryStorage::new();
        let mut reconciler =
            Reconciler::new(TranscriptStore::load(storage.clone()));
        let pending = reconciler.submit(&answer).unwrap();
        prop_assume!(pending.is_some());
        let cursor = pending.unwrap().cursor;

        reconciler.apply_chunk(cursor, &reply).unwrap();
        let once = reconciler.transcript().to_vec();
        let mode = reconciler.mode();
        reconciler.apply_chunk(cursor, &reply).unwrap();

        prop_assert_eq!(reconciler.transcript(), once.as_slice());
        prop_assert_eq!(reconciler.mode(), mode);
        prop_assert_eq!(persisted(&storage), once);
    }

    #[test]
    fn prop_completed_exchanges_double_length(
        replies in proptest::collection::vec(arb_reply(), 0..10)
    ) {
        let mut reconciler =
            Reconciler::new(TranscriptStore::load(MemoryStorage::new()));
        for (n, reply) in replies.iter().enumerate() {
            let cursor = reconciler
                .submit(&format!("answer {n}"))
                .unwrap()
                .unwrap()
                .cursor;
            reconciler.response_started(cursor);
            reconciler.apply_chunk(cursor, reply).unwrap();
            reconciler.finish(cursor, Ok(()));
        }
        prop_assert_eq!(reconciler.transcript().len(), 2 * replies.len());
    }
}
