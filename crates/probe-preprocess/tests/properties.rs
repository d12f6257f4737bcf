//! Property tests: the continuation layer and the preprocessor are
//! transparent for plain text, and reads never come back short mid-stream.

use std::io::Read;

use probe_preprocess::{preprocess_str, ConcatenatingReader, SearchPath, LINE_SEPARATOR};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A source line without continuation markers, directives or terminators.
fn arb_plain_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ;{}()=+.\"]{0,40}".prop_filter("no directive lines", |l| !l.trim_start().starts_with('#'))
}

fn arb_plain_source() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_plain_line(), 0..20)
}

fn normalised(lines: &[String]) -> String {
    lines.iter().map(|l| format!("{l}{LINE_SEPARATOR}")).collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Without markers or directives, output equals input up to terminators.
    #[test]
    fn plain_source_round_trips(lines in arb_plain_source(), crlf in any::<bool>()) {
        let terminator = if crlf { "\r\n" } else { "\n" };
        let input: String = lines.iter().map(|l| format!("{l}{terminator}")).collect();
        let out = preprocess_str(&input, "P.probe", &SearchPath::default()).unwrap();
        prop_assert_eq!(out, normalised(&lines));
    }

    /// `x\` followed by `y` always becomes the single logical line `xy`.
    #[test]
    fn continuation_joins_pairs(first in "[a-z ]{0,10}[a-z]", second in "[a-z]{0,10}") {
        let input = format!("{first}\\\n{second}\n");
        let mut out = String::new();
        ConcatenatingReader::new(input.as_bytes()).read_to_string(&mut out).unwrap();
        prop_assert_eq!(out, format!("{first}{second}{LINE_SEPARATOR}"));
    }

    /// Reading in arbitrary chunk sizes yields the same bytes as one read,
    /// and only the final read is short.
    #[test]
    fn chunked_reads_are_never_short(lines in arb_plain_source(), chunk in 1usize..17) {
        let input: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let expected = normalised(&lines).into_bytes();

        let mut reader = ConcatenatingReader::new(input.as_bytes());
        let mut collected = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = reader.read(&mut buf).unwrap();
            collected.extend_from_slice(&buf[..n]);
            if n < chunk {
                break;
            }
        }
        prop_assert_eq!(collected, expected);
    }
}
