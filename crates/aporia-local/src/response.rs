//! Validation of collaborator responses.
//!
//! Analysis responses are checked strictly: any contract violation rejects the whole
//! response with the exact reason. Nothing is coerced into range.

use aporia_core::{ChatReply, Error, Highlight, Result};
use serde_json::Value;

/// Strip one surrounding markdown code fence (```` ```json ... ``` ````), if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn offset(item: &Value, key: &str, index: usize) -> Result<usize> {
    let v = item
        .get(key)
        .ok_or_else(|| Error::InvalidResponse(format!("highlight {index}: missing `{key}`")))?;
    if let Some(n) = v.as_u64() {
        return usize::try_from(n)
            .map_err(|_| Error::InvalidResponse(format!("highlight {index}: `{key}` too large")));
    }
    if let Some(f) = v.as_f64() {
        if f < 0.0 {
            return Err(Error::InvalidResponse(format!(
                "highlight {index}: `{key}` is negative ({v})"
            )));
        }
        // Whole-number floats such as `3.0` are still integer offsets.
        if f.fract() == 0.0 && f <= u32::MAX as f64 {
            return Ok(f as usize);
        }
    }
    Err(Error::InvalidResponse(format!(
        "highlight {index}: `{key}` must be a non-negative integer, got {v}"
    )))
}

fn text_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Parse and validate `{"highlights": [{start, end, reason, question, explanation}, ...]}`.
///
/// Offsets past the chunk's end are allowed here; the mapper clamps them.
pub fn parse_analysis_response(raw: &str) -> Result<Vec<Highlight>> {
    let body = strip_code_fence(raw);
    let v: Value = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("not valid JSON: {e}")))?;
    let Some(obj) = v.as_object() else {
        return Err(Error::InvalidResponse("expected a JSON object".to_string()));
    };
    if let Some(err) = obj.get("error") {
        let msg = err.as_str().map(|s| s.to_string()).unwrap_or_else(|| err.to_string());
        return Err(Error::Analysis(msg));
    }
    let items = obj
        .get("highlights")
        .ok_or_else(|| Error::InvalidResponse("missing `highlights`".to_string()))?
        .as_array()
        .ok_or_else(|| Error::InvalidResponse("`highlights` is not an array".to_string()))?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(Error::InvalidResponse(format!("highlight {i}: not an object")));
        }
        let start = offset(item, "start", i)?;
        let end = offset(item, "end", i)?;
        if start >= end {
            return Err(Error::InvalidResponse(format!(
                "highlight {i}: start ({start}) must be less than end ({end})"
            )));
        }
        out.push(Highlight {
            start,
            end,
            reason: text_field(item, "reason"),
            question: text_field(item, "question"),
            explanation: text_field(item, "explanation"),
        });
    }
    Ok(out)
}

/// Parse `{"response": "...", "aporiaScore": 0.4}`. The score is returned raw.
pub fn parse_chat_reply(raw: &str) -> Result<ChatReply> {
    let body = strip_code_fence(raw);
    let v: Value =
        serde_json::from_str(body).map_err(|e| Error::Chat(format!("reply is not valid JSON: {e}")))?;
    let response = v
        .get("response")
        .and_then(|r| r.as_str())
        .ok_or_else(|| Error::Chat("reply is missing `response`".to_string()))?
        .to_string();
    let aporia_score = v
        .get("aporiaScore")
        .or_else(|| v.get("aporia_score"))
        .and_then(|s| s.as_f64())
        .unwrap_or(0.0);
    Ok(ChatReply {
        response,
        aporia_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(r: Result<Vec<Highlight>>) -> String {
        match r {
            Err(Error::InvalidResponse(m)) => m,
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn accepts_plain_and_fenced_json() {
        let js = r#"{"highlights":[{"start":0,"end":12,"reason":"r","question":"q?","explanation":"e"}]}"#;
        let plain = parse_analysis_response(js).unwrap();
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].question, "q?");
        let fenced = format!("```json\n{js}\n```");
        assert_eq!(parse_analysis_response(&fenced).unwrap(), plain);
    }

    #[test]
    fn missing_text_fields_default_to_empty() {
        let h = parse_analysis_response(r#"{"highlights":[{"start":1,"end":2}]}"#).unwrap();
        assert_eq!(h[0].reason, "");
        assert!(parse_analysis_response(r#"{"highlights":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn rejects_contract_violations_with_exact_reason() {
        assert!(reason(parse_analysis_response("{}")).contains("missing `highlights`"));
        assert!(reason(parse_analysis_response(r#"{"highlights":{}}"#)).contains("not an array"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":5,"end":5}]}"#))
            .contains("must be less than end"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":9,"end":2}]}"#))
            .contains("start (9)"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":-1,"end":2}]}"#))
            .contains("negative"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":1.5,"end":2}]}"#))
            .contains("non-negative integer"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":"1","end":2}]}"#))
            .contains("non-negative integer"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"end":2}]}"#)).contains("missing `start`"));
        assert!(reason(parse_analysis_response("not json")).contains("not valid JSON"));
        assert!(reason(parse_analysis_response("[1,2]")).contains("JSON object"));
    }

    #[test]
    fn whole_number_float_offsets_are_integers() {
        let h = parse_analysis_response(r#"{"highlights":[{"start":3.0,"end":12.0}]}"#).unwrap();
        assert_eq!((h[0].start, h[0].end), (3, 12));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":3.5,"end":12}]}"#))
            .contains("must be a non-negative integer"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":-2.0,"end":12}]}"#))
            .contains("is negative"));
        assert!(reason(parse_analysis_response(r#"{"highlights":[{"start":1e300,"end":2}]}"#))
            .contains("must be a non-negative integer"));
    }

    #[test]
    fn one_bad_highlight_rejects_the_whole_response() {
        let js = r#"{"highlights":[{"start":0,"end":4},{"start":7,"end":3}]}"#;
        assert!(reason(parse_analysis_response(js)).starts_with("highlight 1:"));
    }

    #[test]
    fn error_object_surfaces_as_analysis_error() {
        let r = parse_analysis_response(r#"{"error":"rate limited"}"#);
        assert!(matches!(r, Err(Error::Analysis(m)) if m == "rate limited"));
    }

    #[test]
    fn chat_reply_parses_both_score_spellings() {
        let r = parse_chat_reply(r#"{"response":"Why?","aporiaScore":0.4}"#).unwrap();
        assert_eq!((r.response.as_str(), r.aporia_score), ("Why?", 0.4));
        let r = parse_chat_reply("```\n{\"response\":\"Hm\",\"aporia_score\":2}\n```").unwrap();
        assert_eq!(r.aporia_score, 2.0);
        let r = parse_chat_reply(r#"{"response":"no score"}"#).unwrap();
        assert_eq!(r.aporia_score, 0.0);
        assert!(matches!(parse_chat_reply("{}"), Err(Error::Chat(_))));
    }

    #[test]
    fn fence_stripping_leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }
}
