//! Turning a document into embeddable text units.
//!
//! One Summary unit per document, built from the analysis payload with a
//! fallback chain that always yields text, plus Chunk units paragraph-packed
//! from the extracted text when it exists.

use tracing::debug;

use vellum_core::defaults::CHUNK_MAX_CHARS;
use vellum_core::{AnalysisPayload, Document, EmbeddableUnit, VectorKind};

/// Build the units to embed for a document. Never fails and never returns an
/// empty list: the filename is the last-resort summary text.
pub fn build_embeddable_units(doc: &Document) -> Vec<EmbeddableUnit> {
    let mut units = vec![EmbeddableUnit {
        kind: VectorKind::Summary,
        text: summary_text(doc),
        start_line: None,
        end_line: None,
        chunk_type: None,
    }];

    if let Some(text) = doc.extracted_text.as_deref() {
        units.extend(chunk_paragraphs(text, CHUNK_MAX_CHARS));
    }

    debug!(
        document_id = %doc.id,
        unit_count = units.len(),
        "Built embeddable units"
    );
    units
}

/// Summary text fallback: concatenated analysis sections (which already start
/// with the summary field), then the filename.
fn summary_text(doc: &Document) -> String {
    if let Some(analysis) = &doc.analysis {
        let joined = join_sections(analysis);
        if !joined.trim().is_empty() {
            return joined;
        }
    }
    doc.filename.clone()
}

fn join_sections(analysis: &AnalysisPayload) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(summary) = analysis.summary.as_deref() {
        if !summary.trim().is_empty() {
            parts.push(summary);
        }
    }
    for list in [
        &analysis.keywords,
        &analysis.semantic_tags,
        &analysis.knowledge_domains,
        &analysis.main_topics,
        &analysis.key_concepts,
    ] {
        parts.extend(list.iter().map(String::as_str));
    }
    parts.join(" ")
}

/// Pack consecutive paragraphs into chunks of at most `max_chars`, keeping
/// 1-based line ranges. A single paragraph larger than the budget becomes its
/// own oversized chunk; the embedder truncates downstream.
fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<EmbeddableUnit> {
    let paragraphs = split_paragraphs(text);
    let mut chunks = Vec::new();

    let mut current = String::new();
    let mut start_line: Option<i64> = None;
    let mut end_line: i64 = 0;

    for para in &paragraphs {
        let addition = if current.is_empty() {
            para.text.len()
        } else {
            para.text.len() + 2
        };
        if !current.is_empty() && current.len() + addition > max_chars {
            chunks.push(make_chunk(&current, start_line, end_line));
            current.clear();
            start_line = None;
        }
        if current.is_empty() {
            start_line = Some(para.start_line);
        } else {
            current.push_str("\n\n");
        }
        current.push_str(&para.text);
        end_line = para.end_line;
    }
    if !current.is_empty() {
        chunks.push(make_chunk(&current, start_line, end_line));
    }
    chunks
}

fn make_chunk(text: &str, start_line: Option<i64>, end_line: i64) -> EmbeddableUnit {
    EmbeddableUnit {
        kind: VectorKind::Chunk,
        text: text.to_string(),
        start_line,
        end_line: Some(end_line),
        chunk_type: Some("paragraph".to_string()),
    }
}

struct Paragraph {
    text: String,
    start_line: i64,
    end_line: i64,
}

/// Split on blank lines, tracking 1-based line numbers.
fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut start_line: i64 = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx as i64 + 1;
        if line.trim().is_empty() {
            if !lines.is_empty() {
                paragraphs.push(Paragraph {
                    text: lines.join("\n"),
                    start_line,
                    end_line: start_line + lines.len() as i64 - 1,
                });
                lines.clear();
            }
        } else {
            if lines.is_empty() {
                start_line = line_no;
            }
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        paragraphs.push(Paragraph {
            text: lines.join("\n"),
            start_line,
            end_line: start_line + lines.len() as i64 - 1,
        });
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;
    use vellum_core::{DocumentStatus, VectorStatus};

    fn doc(filename: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            owner_id: "alice".to_string(),
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            file_size: 100,
            tags: vec![],
            metadata: Map::new(),
            extracted_text: None,
            line_offsets: None,
            analysis: None,
            status: DocumentStatus::AnalysisCompleted,
            vector_status: VectorStatus::NotVectorized,
            error_detail: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_structured_analysis_concatenates_sections() {
        let mut d = doc("invoice.pdf");
        d.analysis = Some(AnalysisPayload {
            summary: Some("Acme invoice for March".to_string()),
            keywords: vec!["acme".to_string(), "invoice".to_string()],
            semantic_tags: vec!["finance".to_string()],
            ..Default::default()
        });

        let units = build_embeddable_units(&d);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, VectorKind::Summary);
        assert_eq!(units[0].text, "Acme invoice for March acme invoice finance");
    }

    #[test]
    fn test_filename_is_last_resort() {
        let units = build_embeddable_units(&doc("quarterly-report.xlsx"));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "quarterly-report.xlsx");
        assert!(units[0].start_line.is_none());
    }

    #[test]
    fn test_empty_analysis_falls_back_to_filename() {
        let mut d = doc("photo.png");
        d.analysis = Some(AnalysisPayload::default());
        let units = build_embeddable_units(&d);
        assert_eq!(units[0].text, "photo.png");
    }

    #[test]
    fn test_whitespace_summary_falls_back_to_filename() {
        let mut d = doc("scan.tiff");
        d.analysis = Some(AnalysisPayload {
            summary: Some("   ".to_string()),
            ..Default::default()
        });
        let units = build_embeddable_units(&d);
        assert_eq!(units[0].text, "scan.tiff");
    }

    #[test]
    fn test_extracted_text_yields_paragraph_chunks() {
        let mut d = doc("notes.txt");
        d.extracted_text = Some("first paragraph\nstill first\n\nsecond paragraph\n".to_string());

        let units = build_embeddable_units(&d);
        let chunks: Vec<_> = units
            .iter()
            .filter(|u| u.kind == VectorKind::Chunk)
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "first paragraph\nstill first\n\nsecond paragraph");
        assert_eq!(chunks[0].start_line, Some(1));
        assert_eq!(chunks[0].end_line, Some(4));
        assert_eq!(chunks[0].chunk_type.as_deref(), Some("paragraph"));
    }

    #[test]
    fn test_chunk_packing_splits_on_budget() {
        let para_a = "a".repeat(600);
        let para_b = "b".repeat(600);
        let chunks = chunk_paragraphs(&format!("{para_a}\n\n{para_b}"), 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_line, Some(1));
        assert_eq!(chunks[0].end_line, Some(1));
        assert_eq!(chunks[1].start_line, Some(3));
        assert_eq!(chunks[1].end_line, Some(3));
    }

    #[test]
    fn test_oversized_paragraph_is_kept_whole() {
        let big = "x".repeat(3000);
        let chunks = chunk_paragraphs(&big, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), 3000);
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let chunks = chunk_paragraphs("\n\nthird line starts here\n", 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, Some(3));
        assert_eq!(chunks[0].end_line, Some(3));
    }

    #[test]
    fn test_blank_only_text_yields_no_chunks() {
        assert!(chunk_paragraphs("\n  \n\t\n", 1000).is_empty());
    }
}
