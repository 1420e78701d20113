use {
    tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, Lines},
    tracing::warn,
};

use crate::{Result, event::ChatEvent};

/// Reads one JSON-encoded [`ChatEvent`] per line.
///
/// Blank lines are ignored. Lines that do not decode are logged and skipped.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: AsyncRead + Unpin> JsonLinesSource<BufReader<R>> {
    pub fn new(reader: R) -> Self {
        Self::from_buffered(BufReader::new(reader))
    }
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn from_buffered(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    /// The next decodable event, or `None` at end of input.
    pub async fn next_event(&mut self) -> Result<Option<ChatEvent>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatEvent>(line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    warn!(line = self.line_number, error = %e, "skipping malformed event");
                },
            }
        }
        Ok(None)
    }

    /// Lines consumed so far, including skipped ones.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_blank_and_malformed_lines() {
        let input = concat!(
            r#"{"sender_id":"u1","message":{"message_id":"m1"}}"#,
            "\n\n",
            "not json\n",
            r#"{"message":{"message_id":"m2","sender":{"user_id":"u2"}}}"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(input.as_bytes());

        let first = source.next_event().await.unwrap().unwrap();
        assert_eq!(first.message.message_id, "m1");
        let second = source.next_event().await.unwrap().unwrap();
        assert_eq!(second.message.message_id, "m2");
        assert!(source.next_event().await.unwrap().is_none());
        assert_eq!(source.line_number(), 4);
    }
}
