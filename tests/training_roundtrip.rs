//! End-to-end training round trips.
//!
//! These tests drive the public API the way an external training loop
//! would: parse oracle and candidate derivations, compute the margin,
//! accumulate gradients per thread, merge them and persist the model.

use std::path::PathBuf;

use srparse::feature::{LabelContext, LabelFeatures};
use srparse::{
    Backward, Gradient, Margin, MarginEvalb, Model, ModelVocab, ObjectiveOptions, Parser,
    StateId, Symbol, Transition,
};

// =============================================================================
// Fixtures
// =============================================================================

const UNARY_LIMIT: usize = 3;

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

fn sentence() -> Vec<Symbol> {
    ["time", "flies", "fast"].map(sym).to_vec()
}

fn vocab() -> ModelVocab {
    ModelVocab::new(sentence(), ["S", "NP", "VP", "NN", "VBZ", "RB", "VP^"].map(sym))
}

fn script(ops: &[(&str, &str)]) -> Vec<Transition> {
    ops.iter()
        .map(|&(op, label)| match op {
            "shift" => Transition::Shift { label: sym(label) },
            "reduce" => Transition::Reduce { label: sym(label) },
            "unary" => Transition::Unary { label: sym(label) },
            "final" => Transition::Final,
            other => panic!("unknown op {other}"),
        })
        .collect()
}

fn gold() -> Vec<Transition> {
    script(&[
        ("shift", "NN"),
        ("unary", "NP"),
        ("shift", "VBZ"),
        ("shift", "RB"),
        ("reduce", "VP"),
        ("reduce", "S"),
        ("final", ""),
    ])
}

fn flat() -> Vec<Transition> {
    script(&[
        ("shift", "NN"),
        ("shift", "VBZ"),
        ("reduce", "VP^"),
        ("shift", "RB"),
        ("reduce", "S"),
        ("final", ""),
    ])
}

/// Replays every script from one axiom and pads the ends to a common step.
fn parse(model: &Model, scripts: &[Vec<Transition>], step: usize) -> Parser<LabelContext> {
    let mut parser = Parser::new();
    let axiom = parser.axiom(model, &LabelFeatures, &sentence());
    for script in scripts {
        let end = parser
            .replay(model, &LabelFeatures, axiom, script, UNARY_LIMIT)
            .expect("script replays");
        parser
            .pad_idle(model, &LabelFeatures, end, step)
            .expect("script ends with final");
    }
    parser
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("srparse-{}-{}", name, std::process::id()))
}

// =============================================================================
// Objective
// =============================================================================

#[test_log::test]
fn padded_candidates_compete_with_the_oracle() {
    let model = Model::new_random(6, 4, vocab(), 3);
    // gold takes 7 transitions, flat takes 6 and is padded with one IDLE.
    let step = 7;
    let oracles = parse(&model, &[gold()], step);
    let candidates = parse(&model, &[gold(), flat()], step);

    assert_eq!(candidates.agenda().bucket(step).len(), 2);
    assert_eq!(oracles.agenda().len(), candidates.agenda().len());

    let mut backward = Backward::new();
    let objective = MarginEvalb::new()
        .margin(&candidates, &oracles, &ObjectiveOptions::default(), &mut backward)
        .unwrap();

    assert!(objective < 0.0 && objective > -1.0, "objective {objective}");
    let finals: Vec<StateId> = candidates.agenda().bucket(step).to_vec();
    assert!(backward.loss(finals[0]) < 0.0);
    assert!(backward.loss(finals[1]) > 0.0);
}

// =============================================================================
// Gradients and persistence
// =============================================================================

#[test_log::test]
fn thread_local_gradients_merge_in_any_order() {
    let model = Model::new_random(4, 2, vocab(), 9);
    let mut shards: Vec<Gradient> = (0..3)
        .map(|i| {
            let mut g = Gradient::new(&model);
            g.count = 1;
            g.weights.wc.fill(i as f64);
            g.weights.bqe[0] = 1.0;
            g
        })
        .collect();

    let mut forward = Gradient::new(&model);
    for shard in &shards {
        forward += shard;
    }
    shards.reverse();
    let mut backward = Gradient::new(&model);
    for shard in &shards {
        backward += shard;
    }

    assert_eq!(forward, backward);
    assert_eq!(forward.count, 3);
    assert_eq!(forward.weights.bqe[0], 3.0);
    assert!(forward.weights.wc.iter().all(|&w| w == 3.0));

    // Apply the averaged gradient as a plain SGD step.
    let mut updated = model.clone();
    let mut step = forward.weights.clone();
    step /= forward.count as f64;
    step *= 0.1;
    updated.weights -= &step;
    assert!((updated.weights.bqe[0] - (model.weights.bqe[0] - 0.1)).abs() < 1e-12);
}

#[test_log::test]
fn saved_model_reloads_and_parses_identically() {
    let mut model = Model::new_random(5, 3, vocab(), 17);
    model.count = 12;
    let dir = temp_dir("model");
    model.save(&dir).unwrap();

    assert!(dir.join("model.bin").exists());
    assert!(dir.join("vocab.json").exists());

    let loaded = Model::load(&dir).unwrap();
    std::fs::remove_dir_all(&dir).unwrap();
    assert_eq!(loaded, model);

    let before = parse(&model, &[gold()], 7);
    let after = parse(&loaded, &[gold()], 7);
    let end = before.agenda().bucket(7)[0];
    assert_eq!(before.state(end).score, after.state(end).score);
    assert_eq!(before.state(end).layer, after.state(end).layer);
}

#[test_log::test]
fn gradient_stream_round_trip() {
    let model = Model::new_random(3, 2, vocab(), 1);
    let mut grad = Gradient::new(&model);
    grad.count = 2;
    grad.weights.wre.fill(0.5);
    grad.weights.ba.fill(-1.0);

    let mut bytes = Vec::new();
    grad.write_to(&mut bytes).unwrap();
    let back = Gradient::read_from(&mut bytes.as_slice(), &model).unwrap();
    assert_eq!(back, grad);
}
