#![allow(dead_code)]

use geneforge::error::{ForgeError, ForgeResult};
use geneforge::library::LibraryDocument;
use geneforge::metrics::{RawFileKind, RawFiles};
use geneforge::optimizer::collaborators::{
    SequenceOptimizer, SequenceRequest, SequenceResult, SynthesisEngine, SynthesisOutput,
    SynthesisRequest,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const PAMTR_SEQ: &str = "CTTGTCCAACCAAATGATTCGTTACCAATTGACATGATACGAAACGTACCGTATCGTTAAGGT";
pub const PPHLF_SEQ: &str = "CGACGTACGGTGGAATCTGATTCGTTACCAATTGACATGATACGAAACGTACCGTATCGTTAAGGT";

fn models() -> Vec<Value> {
    vec![
        json!({
            "collection": "models",
            "name": "A1_AmtR_model",
            "parameters": [
                {"name": "ymax", "value": 3.8},
                {"name": "ymin", "value": 0.06},
                {"name": "K", "value": 0.07},
                {"name": "n", "value": 1.6}
            ]
        }),
        json!({
            "collection": "models",
            "name": "P1_PhlF_model",
            "parameters": [
                {"name": "ymax", "value": 6.8},
                {"name": "ymin", "value": 0.02},
                {"name": "K", "value": 0.23},
                {"name": "n", "value": 4.2}
            ]
        }),
    ]
}

/// A small library with every collection stored as sibling records.
pub fn sibling_library() -> LibraryDocument {
    let mut records = vec![
        json!({"collection": "header", "description": "test library", "version": "1.0"}),
        json!({"collection": "measurement_std", "signal_carrier_units": "RPU"}),
        json!({
            "collection": "gates", "name": "A1_AmtR", "regulator": "AmtR",
            "gate_type": "NOR", "model": "A1_AmtR_model", "structure": "A1_AmtR_structure"
        }),
        json!({
            "collection": "gates", "name": "P1_PhlF", "regulator": "PhlF",
            "gate_type": "NOR", "model": "P1_PhlF_model", "structure": "P1_PhlF_structure"
        }),
    ];
    records.extend(models());
    records.extend(vec![
        json!({"collection": "structures", "name": "A1_AmtR_structure", "outputs": ["pAmtR"]}),
        json!({"collection": "structures", "name": "P1_PhlF_structure", "outputs": ["pPhlF"]}),
        json!({
            "collection": "parts", "type": "promoter", "name": "pAmtR",
            "dnasequence": PAMTR_SEQ
        }),
        json!({
            "collection": "parts", "type": "promoter", "name": "pPhlF",
            "dnasequence": PPHLF_SEQ
        }),
        json!({"collection": "parts", "type": "cds", "name": "AmtR", "dnasequence": "ATGGCAGGCTTA"}),
        json!({
            "collection": "terminators", "type": "terminator", "name": "L3S2P55",
            "dnasequence": "CTCGGTACCAAAGACGAACAATAAGACGCTGAAAAGCGTCTTTTTTCGTTTTGGTCC"
        }),
    ]);
    LibraryDocument::new(records)
}

/// The same content as [`sibling_library`], with array-valued collections
/// nested under one record each.
pub fn nested_library() -> LibraryDocument {
    let sibling = sibling_library();
    let mut records: Vec<Value> = Vec::new();
    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();

    for record in sibling.records() {
        let collection = record["collection"].as_str().unwrap_or_default().to_string();
        if ["header", "measurement_std"].contains(&collection.as_str()) {
            records.push(record.clone());
            continue;
        }
        let mut item = record.clone();
        item.as_object_mut().unwrap().remove("collection");
        match groups.iter_mut().find(|(c, _)| *c == collection) {
            Some((_, items)) => items.push(item),
            None => groups.push((collection, vec![item])),
        }
    }
    for (collection, items) in groups {
        let mut record = Map::new();
        record.insert("collection".to_string(), Value::from(collection.as_str()));
        record.insert(collection, Value::Array(items));
        records.push(Value::Object(record));
    }
    LibraryDocument::new(records)
}

/// Writes a score table and an activity table for output `YFP`.
pub fn write_synthesis_tables(dir: &std::path::Path, score: f64, on: [f64; 2], off: [f64; 2]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("and_circuit_circuit-score.csv"),
        format!("circuit_score,{}\n", score),
    )
    .unwrap();
    fs::write(
        dir.join("and_circuit_activity-table.csv"),
        format!(
            "scores\n,00,01,10,11\nYFP,{},{},{},{}\n\nbinary\n,00,01,10,11\nYFP,0,0,1,1\n",
            off[0], off[1], on[0], on[1]
        ),
    )
    .unwrap();
}

/// Synthesis stand-in that writes the next scripted set of tables per call.
/// Once the script runs out the last entry repeats.
pub struct ScriptedSynthesis {
    script: Vec<(f64, [f64; 2], [f64; 2])>,
    calls: AtomicUsize,
    fail_from: Option<usize>,
    pub libraries: Mutex<Vec<LibraryDocument>>,
}

impl ScriptedSynthesis {
    pub fn new(script: Vec<(f64, [f64; 2], [f64; 2])>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            fail_from: None,
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Errors on every call numbered `call` (zero-based) or later.
    pub fn failing_from(script: Vec<(f64, [f64; 2], [f64; 2])>, call: usize) -> Self {
        Self {
            fail_from: Some(call),
            ..Self::new(script)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SynthesisEngine for ScriptedSynthesis {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> ForgeResult<SynthesisOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from.is_some_and(|from| n >= from) {
            return Err(ForgeError::collaborator("synthesis", "boom"));
        }
        let (score, on, off) = self.script[n.min(self.script.len() - 1)];
        self.libraries
            .lock()
            .unwrap()
            .push(LibraryDocument::load(request.library_path)?);

        write_synthesis_tables(request.output_dir, score, on, off);
        let mut raw_files = RawFiles::new();
        raw_files.insert(
            RawFileKind::CircuitScore,
            request.output_dir.join("and_circuit_circuit-score.csv"),
        );
        Ok(SynthesisOutput {
            output_path: request.output_dir.to_path_buf(),
            raw_files,
        })
    }
}

/// Synthesis stand-in that is never available.
pub struct MissingSynthesis;

impl SynthesisEngine for MissingSynthesis {
    fn synthesize(&self, _: &SynthesisRequest<'_>) -> ForgeResult<SynthesisOutput> {
        Err(ForgeError::collaborator("synthesis", "executable 'cello' not found"))
    }
}

/// Returns the input sequence with its first base replaced by `G`.
pub struct EchoOptimizer {
    pub strength: f64,
}

impl SequenceOptimizer for EchoOptimizer {
    fn optimize(&self, request: &SequenceRequest) -> ForgeResult<SequenceResult> {
        let mut optimized = String::from("G");
        optimized.push_str(request.sequence.get(1..).unwrap_or_default());
        Ok(SequenceResult {
            success: true,
            optimized_sequence: optimized,
            predicted_strength: self.strength,
            error: None,
        })
    }
}

/// Always reports a soft failure.
pub struct RefusingOptimizer;

impl SequenceOptimizer for RefusingOptimizer {
    fn optimize(&self, _: &SequenceRequest) -> ForgeResult<SequenceResult> {
        Ok(SequenceResult::failed("model not loaded"))
    }
}

/// Fails the way an unreachable optimizer process does.
pub struct BrokenOptimizer;

impl SequenceOptimizer for BrokenOptimizer {
    fn optimize(&self, _: &SequenceRequest) -> ForgeResult<SequenceResult> {
        Err(ForgeError::collaborator("sequence optimizer", "connection reset"))
    }
}
