use docassist::chat::normalizer::{highlights, normalize, resolve_scores};
use serde_json::json;

#[test]
fn test_missing_citations_are_empty() {
    let normalized = normalize(&json!({
        "message": {"content": "hello"},
        "model": "gpt-4o"
    }));

    assert_eq!(normalized.content.as_deref(), Some("hello"));
    assert_eq!(normalized.model.as_deref(), Some("gpt-4o"));
    assert!(normalized.citations.is_empty());
    assert!(normalized.usage.is_none());
    assert!(normalized.scores.is_none());
    assert!(normalized.highlights.is_empty());
}

#[test]
fn test_content_only_from_message() {
    let normalized = normalize(&json!({"content": "top level is ignored"}));
    assert!(normalized.content.is_none());
}

#[test]
fn test_usage_is_copied() {
    let normalized = normalize(&json!({
        "message": {"content": "x"},
        "usage": {"total_tokens": 12, "prompt_tokens": 10, "completion_tokens": 2}
    }));
    let usage = normalized.usage.unwrap();
    assert_eq!(usage.total_tokens, 12);
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 2);
}

#[test]
fn test_scores_take_precedence_over_confidence() {
    let scores = resolve_scores(&json!({
        "scores": {"a": 1},
        "confidence": 0.4
    }));
    assert_eq!(scores, Some(json!({"a": 1})));
}

#[test]
fn test_relevance_scores_before_confidence() {
    let scores = resolve_scores(&json!({
        "relevance_scores": [0.9, 0.1],
        "confidence": 0.4
    }));
    assert_eq!(scores, Some(json!([0.9, 0.1])));
}

#[test]
fn test_confidence_is_wrapped() {
    let scores = resolve_scores(&json!({"scores": null, "confidence": 0.4}));
    assert_eq!(scores, Some(json!({"confidence": 0.4})));
}

#[test]
fn test_citation_scan_builds_indexed_keys() {
    let data = json!({
        "citations": [
            {
                "position": 10,
                "score": 0.8,
                "references": [
                    {"file": {"name": "a.pdf"}, "score": 0.5},
                    {"file": {"name": "b.pdf"}}
                ]
            },
            {
                "confidence": 0.3,
                "references": [
                    {"file": {"name": "c.pdf"}},
                    {"file": {"name": "d.pdf"}, "score": 0.1}
                ]
            }
        ]
    });

    let scores = resolve_scores(&data).unwrap();
    assert_eq!(
        scores,
        json!({
            "citation_0_score": 0.8,
            "citation_0_ref_0_score": 0.5,
            "citation_1_confidence": 0.3,
            "citation_1_ref_1_score": 0.1
        })
    );
}

#[test]
fn test_no_score_source_is_none() {
    let data = json!({"citations": [{"references": [{"file": {"name": "a.pdf"}}]}]});
    assert!(resolve_scores(&data).is_none());
}

#[test]
fn test_citations_parsed_and_malformed_skipped() {
    let normalized = normalize(&json!({
        "message": {"content": "x"},
        "citations": [
            {"position": 3, "references": [{"file": {"name": "guide.pdf", "signed_url": "https://s/1"}, "pages": [1, 2]}]},
            "not a citation",
            {"references": []}
        ]
    }));

    assert_eq!(normalized.citations.len(), 2);
    let first = &normalized.citations[0];
    assert_eq!(first.position, Some(3));
    assert_eq!(first.references[0].file.name, "guide.pdf");
    assert_eq!(first.references[0].pages.as_deref(), Some(&[1, 2][..]));
}

#[test]
fn test_blank_highlights_are_dropped() {
    let data = json!({
        "citations": [{
            "references": [
                {"file": {"name": "a"}, "highlight": {"type": "text", "content": "key passage"}},
                {"file": {"name": "b"}, "highlight": null},
                {"file": {"name": "c"}, "highlight": {}},
                {"file": {"name": "d"}, "highlight": {"content": "  "}},
                {"file": {"name": "e"}, "highlight": ""},
                {"file": {"name": "f"}},
                {"file": {"name": "g"}, "highlight": "inline text"}
            ]
        }]
    });

    let found = highlights(&data);
    assert_eq!(
        found,
        vec![
            json!({"type": "text", "content": "key passage"}),
            json!("inline text")
        ]
    );
}
