use proptest::prelude::*;
use treasure_hunter_bot::formatter::{chunks, utf16_len};

proptest! {
    /// Chunks are contiguous: joining them gives back the input.
    #[test]
    fn chunks_reconstruct_input(text in "\\PC*", limit in 1usize..200) {
        let joined: String = chunks(&text, limit).collect();
        prop_assert_eq!(joined, text);
    }

    /// No chunk exceeds the limit, and none is empty.
    #[test]
    fn chunks_respect_limit(text in "[a-zA-Z .,!?\n]{0,2000}", limit in 1usize..300) {
        for chunk in chunks(&text, limit) {
            prop_assert!(!chunk.is_empty());
            prop_assert!(chunk.chars().count() <= limit);
        }
    }

    /// Emoji-heavy text never produces a chunk Telegram would reject.
    #[test]
    fn chunks_fit_in_utf16_units(text in "[a-z 🪙💰⛏️👍🏽\n]{0,1500}", limit in 1usize..300) {
        let mut total = 0;
        for chunk in chunks(&text, limit) {
            let units = utf16_len(chunk);
            prop_assert!(units <= limit.max(2), "chunk of {} units over limit {}", units, limit);
            total += units;
        }
        prop_assert_eq!(total, utf16_len(&text));
    }

    /// Short texts are sent as a single, unchanged message.
    #[test]
    fn short_text_is_one_chunk(text in "\\PC{1,100}") {
        // Up to two UTF-16 units per char
        let parts: Vec<&str> = chunks(&text, 200).collect();
        prop_assert_eq!(parts, vec![text.as_str()]);
    }

    /// Text of three times the limit needs at least three messages.
    #[test]
    fn triple_length_needs_three_chunks(words in proptest::collection::vec("[a-z]{1,12}", 1..400), limit in 20usize..200) {
        let mut text = words.join(" ");
        while text.chars().count() < 3 * limit {
            text.push_str(" filler");
        }
        let text: String = text.chars().take(3 * limit).collect();

        let parts: Vec<&str> = chunks(&text, limit).collect();
        prop_assert!(parts.len() >= 3);
        prop_assert_eq!(parts.concat(), text);
    }

    /// Where the window has a space, words are never cut in half.
    #[test]
    fn words_stay_whole(words in proptest::collection::vec("[a-z]{1,10}", 1..300), limit in 12usize..120) {
        let text = words.join(" ");
        for chunk in chunks(&text, limit) {
            let next_is_letter = |c: char| c.is_ascii_lowercase();
            // A chunk either ends the text or ends right after whitespace
            let end = chunk.as_ptr() as usize - text.as_ptr() as usize + chunk.len();
            if end < text.len() {
                prop_assert!(
                    chunk.ends_with(' ') || !text[end..].starts_with(next_is_letter),
                    "split inside a word at byte {}", end
                );
            }
        }
    }
}
