//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! Common-header text format (§4.4): the six well-known `Label: value\r\n`
//! fields carried by the metadata chunk.

use crate::error::ParseError;

/// The parsed common headers. `Date`, `To`, `From`, `Subject` are required;
/// `Organization` and `Cc` are optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommonHeaders {
    pub date: String,
    pub to: String,
    pub cc: Option<String>,
    pub from: String,
    pub organization: Option<String>,
    pub subject: String,
}

const REQUIRED_LABELS: [&str; 4] = ["Date", "To", "From", "Subject"];
const ALL_LABELS: [&str; 6] = ["Date", "To", "Cc", "From", "Organization", "Subject"];

/// Render `headers` in canonical label order.
pub fn encode_common_headers(headers: &CommonHeaders) -> String {
    let mut out = String::new();
    out.push_str(&format!("Date: {}\r\n", headers.date));
    out.push_str(&format!("To: {}\r\n", headers.to));
    if let Some(cc) = &headers.cc {
        out.push_str(&format!("Cc: {cc}\r\n"));
    }
    out.push_str(&format!("From: {}\r\n", headers.from));
    if let Some(org) = &headers.organization {
        out.push_str(&format!("Organization: {org}\r\n"));
    }
    out.push_str(&format!("Subject: {}\r\n", headers.subject));
    out
}

/// Parse `text` as a common-header block: exactly the six well-known
/// labels, each at most once, in any order, with the four required ones
/// present.
pub fn parse_common_headers(text: &str) -> Result<CommonHeaders, ParseError> {
    let mut date = None;
    let mut to = None;
    let mut cc = None;
    let mut from = None;
    let mut organization = None;
    let mut subject = None;

    for line in text.split("\r\n").filter(|l| !l.is_empty()) {
        let (label, value) = line.split_once(": ").ok_or_else(|| ParseError::UnexpectedLabel {
            expected: ALL_LABELS.iter().map(|s| s.to_string()).collect(),
            found: line.to_string(),
        })?;
        let slot = match label {
            "Date" => &mut date,
            "To" => &mut to,
            "Cc" => &mut cc,
            "From" => &mut from,
            "Organization" => &mut organization,
            "Subject" => &mut subject,
            other => return Err(ParseError::UnknownHeader(other.to_string())),
        };
        if slot.is_some() {
            return Err(ParseError::DuplicateHeader(label.to_string()));
        }
        *slot = Some(value.to_string());
    }

    for label in REQUIRED_LABELS {
        let present = match label {
            "Date" => date.is_some(),
            "To" => to.is_some(),
            "From" => from.is_some(),
            "Subject" => subject.is_some(),
            _ => unreachable!(),
        };
        if !present {
            return Err(ParseError::MissingRequiredHeader(label.to_string()));
        }
    }

    Ok(CommonHeaders {
        date: date.unwrap(),
        to: to.unwrap(),
        cc,
        from: from.unwrap(),
        organization,
        subject: subject.unwrap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommonHeaders {
        CommonHeaders {
            date: "Mon, 1 Jan 2026 00:00:00 +0000".into(),
            to: "ryan@lavabit.com".into(),
            cc: None,
            from: "ivan@darkmail.info".into(),
            organization: None,
            subject: "Mr.Watson - Come here - I want to see you".into(),
        }
    }

    #[test]
    fn required_headers_round_trip() {
        let headers = sample();
        let text = encode_common_headers(&headers);
        let parsed = parse_common_headers(&text).unwrap();
        assert_eq!(parsed, headers);
    }

    #[test]
    fn optional_headers_round_trip_when_present() {
        let mut headers = sample();
        headers.cc = Some("watson@bell.org".into());
        headers.organization = Some("Dark Mail Technical Alliance".into());
        let text = encode_common_headers(&headers);
        let parsed = parse_common_headers(&text).unwrap();
        assert_eq!(parsed, headers);
    }

    #[test]
    fn missing_required_header_is_rejected() {
        let text = "To: ryan@lavabit.com\r\nFrom: ivan@darkmail.info\r\nSubject: hi\r\n";
        assert!(matches!(
            parse_common_headers(text),
            Err(ParseError::MissingRequiredHeader(_))
        ));
    }

    #[test]
    fn duplicate_header_is_rejected() {
        let text = "Date: d\r\nTo: a\r\nTo: b\r\nFrom: c\r\nSubject: s\r\n";
        assert!(matches!(parse_common_headers(text), Err(ParseError::DuplicateHeader(_))));
    }

    #[test]
    fn unknown_header_is_rejected() {
        let text = "Date: d\r\nTo: a\r\nFrom: c\r\nSubject: s\r\nBcc: hidden\r\n";
        assert!(matches!(parse_common_headers(text), Err(ParseError::UnknownHeader(_))));
    }
}
