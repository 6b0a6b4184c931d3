use serde_json::{json, Value};

use docqa_core::config::ProcessorConfig;
use docqa_core::types::{Chunk, Metadata};
use docqa_core::Error;
use docqa_text::{ChunkingStrategy, DocumentProcessor};

fn processor(strategy: &str, chunk_size: usize, chunk_overlap: usize) -> DocumentProcessor {
    DocumentProcessor::new(ProcessorConfig {
        chunk_size,
        chunk_overlap,
        strategy: strategy.to_string(),
        ..ProcessorConfig::default()
    })
    .expect("valid config")
}

fn doc_meta(id: &str) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("document_id".into(), Value::String(id.into()));
    meta
}

fn sample_text() -> String {
    let mut text = String::new();
    for p in 0..6 {
        for s in 0..5 {
            text.push_str(&format!(
                "Paragraph {p} sentence {s} talks about retrieval pipelines and vector stores. "
            ));
        }
        text.push_str("\n\n");
    }
    text
}

fn assert_located(text: &str, chunks: &[Chunk]) {
    for chunk in chunks {
        assert!(chunk.end_index > chunk.start_index, "empty range for chunk {}", chunk.chunk_index);
        assert_eq!(&text[chunk.start_index..chunk.end_index], chunk.content);
    }
}

#[test]
fn empty_and_blank_input_yield_no_chunks() {
    for strategy in ChunkingStrategy::ALL {
        let p = processor(strategy.as_str(), 100, 10);
        assert!(p.process("", &Metadata::new()).is_empty());
        assert!(p.process("  \n\t \n", &Metadata::new()).is_empty());
    }
}

#[test]
fn invalid_configuration_is_rejected() {
    let bad_strategy = DocumentProcessor::new(ProcessorConfig {
        strategy: "by_vibes".into(),
        ..ProcessorConfig::default()
    });
    assert!(matches!(bad_strategy, Err(Error::Configuration(_))));

    let bad_overlap = DocumentProcessor::new(ProcessorConfig {
        chunk_size: 100,
        chunk_overlap: 100,
        ..ProcessorConfig::default()
    });
    assert!(matches!(bad_overlap, Err(Error::Configuration(_))));

    let zero_size = DocumentProcessor::new(ProcessorConfig {
        chunk_size: 0,
        chunk_overlap: 0,
        ..ProcessorConfig::default()
    });
    assert!(matches!(zero_size, Err(Error::Configuration(_))));
}

#[test]
fn strategy_names_parse() {
    assert_eq!("sliding-window".parse::<ChunkingStrategy>().expect("parse"), ChunkingStrategy::SlidingWindow);
    assert_eq!("Structural".parse::<ChunkingStrategy>().expect("parse"), ChunkingStrategy::Structural);
    assert!("fixed".parse::<ChunkingStrategy>().is_err());
}

#[test]
fn chunk_ids_are_idempotent_for_every_strategy() {
    let text = sample_text();
    for strategy in ChunkingStrategy::ALL {
        let p = processor(strategy.as_str(), 200, 40);
        let first: Vec<String> = p.process(&text, &doc_meta("guide")).into_iter().map(|c| c.chunk_id).collect();
        let second: Vec<String> = p.process(&text, &doc_meta("guide")).into_iter().map(|c| c.chunk_id).collect();
        assert!(!first.is_empty());
        assert_eq!(first, second, "strategy {strategy}");
    }
}

#[test]
fn chunks_respect_size_and_overlap_bounds() {
    let text = sample_text();
    let (size, overlap) = (200, 40);
    for strategy in ChunkingStrategy::ALL {
        let chunks = processor(strategy.as_str(), size, overlap).process(&text, &doc_meta("guide"));
        assert!(chunks.len() > 1, "strategy {strategy}");
        assert_located(&text, &chunks);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= size, "strategy {strategy}: chunk too large");
        }
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start_index > prev.start_index, "strategy {strategy}: starts not increasing");
            assert!(next.end_index >= prev.end_index, "strategy {strategy}: ends went backwards");
            if prev.end_index > next.start_index {
                let shared = text[next.start_index..prev.end_index].chars().count();
                assert!(shared <= overlap, "strategy {strategy}: overlap {shared} > {overlap}");
            }
        }
    }
}

#[test]
fn recursive_chunks_cover_all_non_whitespace() {
    let text = sample_text();
    let chunks = processor("recursive", 150, 30).process(&text, &Metadata::new());
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            continue;
        }
        assert!(
            chunks.iter().any(|c| c.start_index <= i && i < c.end_index),
            "byte {i} not covered"
        );
    }
}

#[test]
fn sliding_window_produces_three_windows_for_2600_chars() {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon"];
    let mut text = String::new();
    let mut i = 0;
    while text.len() < 2600 {
        text.push_str(words[i % words.len()]);
        text.push(' ');
        i += 1;
    }
    text.truncate(2600);

    let chunks = processor("sliding_window", 1000, 100).process(&text, &Metadata::new());
    assert_eq!(chunks.len(), 3);
    assert_located(&text, &chunks);
    for pair in chunks.windows(2) {
        assert!(pair[1].start_index > pair[0].start_index);
        let shared = pair[0].end_index.saturating_sub(pair[1].start_index);
        assert!((80..=100).contains(&shared), "overlap was {shared}");
    }
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 1000);
        assert!(!chunk.content.starts_with(' ') && !chunk.content.ends_with(' '));
    }
}

#[test]
fn semantic_chunks_end_on_sentence_boundaries() {
    let text: String = (1..=8).map(|i| format!("This is sentence number {i} of the set. ")).collect();
    let chunks = processor("semantic", 100, 45).process(&text, &Metadata::new());
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.content.ends_with('.'), "chunk {:?}", chunk.content);
        assert!(chunk.content.starts_with("This is sentence"), "chunk {:?}", chunk.content);
    }
}

#[test]
fn structural_chunks_start_at_headers() {
    let body = "Details about this part of the handbook follow in plain prose. ".repeat(2);
    let text = format!("# Install\n{body}\n\n## Configure\n{body}\n\n## Operate\n{body}\n");
    let chunks = processor("structural", 200, 20).process(&text, &Metadata::new());
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert!(chunk.content.starts_with('#'), "chunk {:?}", chunk.content);
        assert_eq!(chunk.metadata["has_header"], json!(true));
    }
    assert_eq!(chunks[0].metadata["header_level"], json!(1));
    assert_eq!(chunks[1].metadata["header_level"], json!(2));
}

const CODE: &str = "```rust\nfn main() {\n    println!(\"hello\");\n}\n\n// second part. More code here.\nlet x = 1;\n```";

#[test]
fn protected_code_blocks_stay_whole() {
    let text = format!("Intro paragraph about setup.\n\n{CODE}\n\nClosing remarks follow here.");
    let chunks = processor("recursive", 60, 10).process(&text, &Metadata::new());
    assert_located(&text, &chunks);

    let holders: Vec<&Chunk> = chunks.iter().filter(|c| c.content.contains("fn main")).collect();
    assert_eq!(holders.len(), 1);
    assert!(holders[0].content.contains(CODE));
    assert_eq!(holders[0].metadata["has_code"], json!(true));
    assert!(chunks.iter().any(|c| c.metadata["has_code"] == json!(false)));
}

fn processor_with_code(strategy: ChunkingStrategy, size: usize, overlap: usize, preserve: bool) -> DocumentProcessor {
    DocumentProcessor::new(ProcessorConfig {
        chunk_size: size,
        chunk_overlap: overlap,
        strategy: strategy.as_str().to_string(),
        preserve_code_blocks: preserve,
        ..ProcessorConfig::default()
    })
    .expect("valid config")
}

fn tricky_texts() -> Vec<String> {
    let repeated = "Intro text here. Middle words go here and there.\n\n".repeat(4) + "Intro text here. tail.";
    vec![
        repeated,
        format!("Intro text here. {CODE} Middle words go here and there. {CODE} tail."),
        format!("# Setup\nInstall the tools first.\n\n{CODE}\n\n## Usage\n- run it\n- check it\n\nSame line. Same line. Same line.\n"),
    ]
}

// Located, ordered, bounded overlap, bounded size (code excepted), full
// coverage of the non-whitespace text.
fn assert_well_formed(label: &str, text: &str, chunks: &[Chunk], size: usize, overlap: usize, preserve: bool) {
    assert!(!chunks.is_empty(), "{label}: no chunks");
    assert_located(text, chunks);
    for pair in chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert!(next.start_index > prev.start_index, "{label}: starts not increasing");
        assert!(next.end_index >= prev.end_index, "{label}: ends went backwards");
        if prev.end_index > next.start_index {
            let shared = text[next.start_index..prev.end_index].chars().count();
            assert!(shared <= overlap, "{label}: overlap {shared} > {overlap}");
        }
    }
    for chunk in chunks {
        if !(preserve && chunk.content.contains("```")) {
            assert!(chunk.content.chars().count() <= size, "{label}: chunk {:?} too large", chunk.content);
        }
    }
    for (i, ch) in text.char_indices() {
        if !ch.is_whitespace() {
            assert!(
                chunks.iter().any(|c| c.start_index <= i && i < c.end_index),
                "{label}: byte {i} not covered"
            );
        }
    }
    if preserve {
        for (at, _) in text.match_indices(CODE) {
            assert!(
                chunks.iter().any(|c| c.start_index <= at && at + CODE.len() <= c.end_index),
                "{label}: code block at {at} split"
            );
        }
    }
}

#[test]
fn every_strategy_is_well_formed_under_high_overlap_repeats_and_code() {
    let configs = [(10, 8), (20, 15), (20, 19), (30, 20), (50, 30), (80, 30), (100, 60), (200, 150)];
    for text in tricky_texts() {
        for strategy in ChunkingStrategy::ALL {
            for (size, overlap) in configs {
                for preserve in [true, false] {
                    let label = format!("{strategy} {size}/{overlap} preserve={preserve}");
                    let chunks = processor_with_code(strategy, size, overlap, preserve).process(&text, &Metadata::new());
                    assert_well_formed(&label, &text, &chunks, size, overlap, preserve);
                }
            }
        }
    }
}

#[test]
fn sliding_window_never_repeats_a_code_block_in_the_overlap() {
    let text = format!("Some words before the block.\n\n{CODE}\n\nAnd a few words after it to finish.");
    for (size, overlap) in [(30, 20), (50, 30), (80, 30), (100, 60), (200, 150)] {
        let chunks = processor_with_code(ChunkingStrategy::SlidingWindow, size, overlap, true)
            .process(&text, &Metadata::new());
        let holders = chunks.iter().filter(|c| c.content.contains(CODE)).count();
        assert_eq!(holders, 1, "{size}/{overlap}");
    }
}

#[test]
fn unprotected_code_blocks_may_be_split() {
    let text = format!("Intro paragraph about setup.\n\n{CODE}\n\nClosing remarks follow here.");
    let chunks = DocumentProcessor::new(ProcessorConfig {
        chunk_size: 60,
        chunk_overlap: 10,
        preserve_code_blocks: false,
        ..ProcessorConfig::default()
    })
    .expect("config")
    .process(&text, &Metadata::new());

    assert!(chunks.iter().all(|c| !c.content.contains(CODE)));
    assert!(chunks.iter().all(|c| !c.metadata.contains_key("has_code")));
}

#[test]
fn metadata_is_merged_and_enriched() {
    let mut meta = doc_meta("faq");
    meta.insert("source".into(), json!("support"));
    let text = "# FAQ\n\n- reset your password at https://example.com/reset\n1. open settings\n2. click save";
    let chunks = processor("recursive", 1000, 100).process(text, &meta);
    assert_eq!(chunks.len(), 1);

    let m = &chunks[0].metadata;
    assert_eq!(chunks[0].document_id, "faq");
    assert_eq!(m["source"], json!("support"));
    assert_eq!(m["chunk_index"], json!(0));
    assert_eq!(m["total_chunks"], json!(1));
    assert_eq!(m["chunking_strategy"], json!("recursive"));
    assert_eq!(m["has_urls"], json!(true));
    assert_eq!(m["has_numbers"], json!(true));
    assert_eq!(m["has_list"], json!(true));
    assert_eq!(m["has_numbered_list"], json!(true));
    assert_eq!(m["header_level"], json!(1));
    assert!(m["word_count"].as_u64().expect("word_count") > 5);
    assert!(m.contains_key("processed_at"));
}

#[test]
fn plain_mode_skips_derived_metadata() {
    let p = DocumentProcessor::new(ProcessorConfig {
        enrich_metadata: false,
        preserve_structure: false,
        ..ProcessorConfig::default()
    })
    .expect("config");
    let chunks = p.process("Just a line of text.", &Metadata::new());
    let m = &chunks[0].metadata;
    assert!(!m.contains_key("word_count"));
    assert!(!m.contains_key("has_header"));
    assert!(chunks[0].document_id.starts_with("doc-"), "derived id {}", chunks[0].document_id);
}

#[test]
fn directory_processing_walks_text_and_markdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a.txt"), "First file about backups.").expect("write a");
    std::fs::create_dir(dir.path().join("ops")).expect("mkdir");
    std::fs::write(dir.path().join("ops").join("b.md"), "# Runbook\n\nRestart the service.").expect("write b");
    std::fs::write(dir.path().join("ignored.bin"), [0u8, 1, 2]).expect("write bin");

    let chunks = processor("recursive", 500, 50).process_directory(dir.path()).expect("process dir");
    let ids: Vec<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
    assert_eq!(ids, vec!["a.txt", "ops/b.md"]);
    assert_eq!(chunks[0].metadata["category"], json!("general"));
    assert_eq!(chunks[1].metadata["category"], json!("ops"));

    let missing = processor("recursive", 500, 50).process_directory(&dir.path().join("nope"));
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

#[cfg(unix)]
#[test]
fn directory_processing_fails_on_unreadable_documents() {
    use std::os::unix::fs::symlink;

    let dir = tempfile::tempdir().expect("tempdir");
    let outside = tempfile::tempdir().expect("tempdir");
    std::fs::write(outside.path().join("shared.md"), "Shared notes about the pump.").expect("write shared");
    std::fs::write(dir.path().join("a.txt"), "First file about backups.").expect("write a");
    symlink(outside.path().join("shared.md"), dir.path().join("linked.md")).expect("link");

    let chunks = processor("recursive", 500, 50).process_directory(dir.path()).expect("process dir");
    let ids: Vec<&str> = chunks.iter().map(|c| c.document_id.as_str()).collect();
    assert_eq!(ids, vec!["a.txt", "linked.md"]);

    symlink(dir.path().join("gone.md"), dir.path().join("broken.md")).expect("dangling link");
    match processor("recursive", 500, 50).process_directory(dir.path()) {
        Err(Error::Io(err)) => assert!(err.to_string().contains("broken.md"), "error names the file: {err}"),
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn statistics_summarise_chunk_sizes() {
    let p = processor("recursive", 150, 30);
    let chunks = p.process(&sample_text(), &Metadata::new());
    let stats = p.statistics(&chunks);
    assert_eq!(stats.total_chunks, chunks.len());
    assert_eq!(stats.strategy, ChunkingStrategy::Recursive);
    assert!(stats.min_chunk_size <= stats.max_chunk_size);
    assert!(stats.max_chunk_size <= 150);
    assert!((stats.average_chunk_size * chunks.len() as f64 - stats.total_characters as f64).abs() < 1e-6);

    let empty = p.statistics(&[]);
    assert_eq!(empty.total_chunks, 0);
    assert_eq!(empty.average_chunk_size, 0.0);
}
