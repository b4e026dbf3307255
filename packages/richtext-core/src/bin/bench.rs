use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use richtext_core::writer::Target;
use richtext_core::{Attributes, Document, DocumentConfig, Node, Position, Range, ReplicaId};

#[derive(serde::Serialize)]
struct Output {
    implementation: &'static str,
    storage: &'static str,
    workload: String,
    timestamp: String,
    name: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
struct Extra {
    count: u64,
}

fn at(path: &[usize]) -> Position {
    Position::new("main", path.to_vec()).expect("non-empty path")
}

fn main() {
    let mut count: u64 = 200;
    let mut out_file: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            count = val.parse().unwrap_or(count);
        } else if let Some(val) = arg.strip_prefix("--out=") {
            out_file = Some(PathBuf::from(val));
        }
    }

    let config = DocumentConfig::default().with_operation_log_limit(0);
    let mut doc = Document::with_config(ReplicaId::new(b"core"), config).expect("config");
    doc.change(|w| w.insert(Node::element("paragraph"), &at(&[0])))
        .expect("insert paragraph");

    let start = Instant::now();
    for i in 0..count {
        doc.change(|w| w.insert_text("x", Attributes::new(), &at(&[0, i as usize])))
            .expect("type");
    }
    for _ in 0..count {
        let first = Range::new(at(&[0, 0]), at(&[0, 1])).expect("range");
        doc.change(|w| w.remove(&Target::Range(first))).expect("remove");
    }
    let _ = doc.operations_since(0).expect("history");
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let output = Output {
        implementation: "richtext-core",
        storage: "memory",
        workload: format!("type-delete-{}", count),
        timestamp: chrono::Utc::now().to_rfc3339(),
        name: format!("type-delete-{}", count),
        total_ops: count * 2,
        duration_ms,
        ops_per_sec: if duration_ms > 0.0 {
            (count as f64 * 2.0) / duration_ms * 1000.0
        } else {
            f64::INFINITY
        },
        extra: Extra { count },
        source_file: out_file.as_ref().map(|p| p.display().to_string()),
    };

    let json = serde_json::to_string_pretty(&output).expect("serialize");
    if let Some(path) = out_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdirs");
        }
        fs::write(&path, &json).expect("write output");
    }
    println!("{}", json);
}
