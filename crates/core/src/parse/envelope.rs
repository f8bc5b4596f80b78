//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Envelope-chunk text format (§4.4): the four labeled identifier/
//! fingerprint lines carried by the origin and destination chunks.

use crate::error::ParseError;

/// Which of the two envelope chunks a text blob belongs to; each carries a
/// different, fixed label quadruple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeChunkKind {
    /// `Author: <id>\r\n Author-Signet: [fp]\r\n Destination: <id>\r\n Destination-Signet: [fp]\r\n`
    Origin,
    /// `Recipient: <id>\r\n Recipient-Signet: [fp]\r\n Origin: <id>\r\n Origin-Signet: [fp]\r\n`
    Destination,
}

impl EnvelopeChunkKind {
    fn labels(self) -> [&'static str; 4] {
        match self {
            EnvelopeChunkKind::Origin => ["Author", "Author-Signet", "Destination", "Destination-Signet"],
            EnvelopeChunkKind::Destination => {
                ["Recipient", "Recipient-Signet", "Origin", "Origin-Signet"]
            }
        }
    }
}

/// The four identifier/fingerprint strings an envelope chunk carries, in
/// label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeIds {
    pub primary_id: String,
    pub primary_fingerprint: String,
    pub secondary_id: String,
    pub secondary_fingerprint: String,
}

/// Render `ids` as the `label <value>\r\n` / `label [value]\r\n` text block
/// for `kind`.
pub fn encode_envelope(kind: EnvelopeChunkKind, ids: &EnvelopeIds) -> String {
    let labels = kind.labels();
    format!(
        "{}: <{}>\r\n{}: [{}]\r\n{}: <{}>\r\n{}: [{}]\r\n",
        labels[0],
        ids.primary_id,
        labels[1],
        ids.primary_fingerprint,
        labels[2],
        ids.secondary_id,
        labels[3],
        ids.secondary_fingerprint,
    )
}

fn check_printable(text: &str) -> Result<(), ParseError> {
    for (offset, byte) in text.bytes().enumerate() {
        let printable = matches!(byte, 0x20..=0x7E) || byte == b'\r' || byte == b'\n';
        if !printable {
            return Err(ParseError::NonPrintable(offset));
        }
    }
    Ok(())
}

fn expect_label<'a>(line: &'a str, label: &str) -> Result<&'a str, ParseError> {
    let prefix = format!("{label}: ");
    line.strip_prefix(prefix.as_str())
        .ok_or_else(|| ParseError::UnexpectedLabel {
            expected: vec![label.to_string()],
            found: line.to_string(),
        })
}

fn parse_angle(line: &str, label: &str) -> Result<String, ParseError> {
    let rest = expect_label(line, label)?;
    let inner = rest
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .ok_or_else(|| ParseError::UnexpectedLabel {
            expected: vec![format!("{label}: <value>")],
            found: line.to_string(),
        })?;
    Ok(inner.to_string())
}

fn parse_bracket(line: &str, label: &str) -> Result<String, ParseError> {
    let rest = expect_label(line, label)?;
    let inner = rest
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ParseError::UnexpectedLabel {
            expected: vec![format!("{label}: [value]")],
            found: line.to_string(),
        })?;
    Ok(inner.to_string())
}

/// Parse `text` as the labeled quadruple for `kind`, rejecting non-printable
/// bytes, unexpected labels, or a label order/count mismatch.
pub fn parse_envelope(kind: EnvelopeChunkKind, text: &str) -> Result<EnvelopeIds, ParseError> {
    check_printable(text)?;
    let labels = kind.labels();
    let mut lines = text.split("\r\n").filter(|l| !l.is_empty());

    let line0 = lines
        .next()
        .ok_or_else(|| ParseError::MissingRequiredHeader(labels[0].to_string()))?;
    let primary_id = parse_angle(line0, labels[0])?;

    let line1 = lines
        .next()
        .ok_or_else(|| ParseError::MissingRequiredHeader(labels[1].to_string()))?;
    let primary_fingerprint = parse_bracket(line1, labels[1])?;

    let line2 = lines
        .next()
        .ok_or_else(|| ParseError::MissingRequiredHeader(labels[2].to_string()))?;
    let secondary_id = parse_angle(line2, labels[2])?;

    let line3 = lines
        .next()
        .ok_or_else(|| ParseError::MissingRequiredHeader(labels[3].to_string()))?;
    let secondary_fingerprint = parse_bracket(line3, labels[3])?;

    if lines.next().is_some() {
        return Err(ParseError::ChunkTypeMismatch);
    }

    Ok(EnvelopeIds {
        primary_id,
        primary_fingerprint,
        secondary_id,
        secondary_fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ids() -> EnvelopeIds {
        EnvelopeIds {
            primary_id: "ivan@darkmail.info".into(),
            primary_fingerprint: "ZmluZ2VycHJpbnQ".into(),
            secondary_id: "lavabit.com".into(),
            secondary_fingerprint: "b3RoZXJmcA".into(),
        }
    }

    #[test]
    fn origin_envelope_round_trips() {
        let ids = sample_ids();
        let text = encode_envelope(EnvelopeChunkKind::Origin, &ids);
        assert!(text.starts_with("Author: <ivan@darkmail.info>\r\n"));
        let parsed = parse_envelope(EnvelopeChunkKind::Origin, &text).unwrap();
        assert_eq!(parsed, ids);
    }

    #[test]
    fn destination_envelope_uses_recipient_origin_labels() {
        let ids = sample_ids();
        let text = encode_envelope(EnvelopeChunkKind::Destination, &ids);
        assert!(text.contains("Recipient: <ivan@darkmail.info>"));
        assert!(text.contains("Origin: <lavabit.com>"));
        let parsed = parse_envelope(EnvelopeChunkKind::Destination, &text).unwrap();
        assert_eq!(parsed, ids);
    }

    #[test]
    fn wrong_chunk_kind_is_rejected() {
        let ids = sample_ids();
        let text = encode_envelope(EnvelopeChunkKind::Origin, &ids);
        assert!(parse_envelope(EnvelopeChunkKind::Destination, &text).is_err());
    }

    #[test]
    fn non_printable_byte_is_rejected() {
        let text = "Author: <iv\u{0007}an>\r\n";
        assert!(matches!(
            parse_envelope(EnvelopeChunkKind::Origin, text),
            Err(ParseError::NonPrintable(_))
        ));
    }
}
