// src/main.rs

//! Scores one training instance: replays its oracle and candidate
//! derivations under a freshly initialized model and reports the margin
//! objective.
//!
//! ```text
//! srparse <instance.json> [--save <dir>]
//! ```
//!
//! The instance holds the sentence, the oracle script and the candidate
//! scripts, each a list of transitions such as `{"op": "shift", "label": "NN"}`.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{bail, Context};
use log::{debug, info};
use serde::Deserialize;

use srparse::{
    config::CONFIG,
    feature::{LabelContext, LabelFeatures},
    Backward, Margin, MarginEvalb, Model, ModelVocab, Parser, StateId, Symbol, Transition,
};

#[derive(Debug, Deserialize)]
struct Instance {
    sentence: Vec<Symbol>,
    oracle: Vec<Transition>,
    candidates: Vec<Vec<Transition>>,
}

impl Instance {
    fn labels(&self) -> impl Iterator<Item = Symbol> + '_ {
        std::iter::once(&self.oracle)
            .chain(&self.candidates)
            .flatten()
            .filter_map(|transition| match transition {
                Transition::Shift { label }
                | Transition::Reduce { label }
                | Transition::Unary { label } => Some(label.clone()),
                Transition::Final | Transition::Idle => None,
            })
    }
}

struct Args {
    instance: PathBuf,
    save: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut instance = None;
    let mut save = None;
    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--save" {
            save = Some(PathBuf::from(args.next().context("--save needs a directory")?));
        } else if instance.is_none() {
            instance = Some(PathBuf::from(arg));
        } else {
            bail!("unexpected argument {:?}", arg);
        }
    }
    Ok(Args {
        instance: instance.context("usage: srparse <instance.json> [--save <dir>]")?,
        save,
    })
}

/// Pads every finished derivation end to `step`.
fn pad_all(
    parser: &mut Parser<LabelContext>,
    model: &Model,
    ends: &[StateId],
    step: usize,
) -> anyhow::Result<()> {
    for &end in ends {
        parser
            .pad_idle(model, &LabelFeatures, end, step)
            .with_context(|| format!("padding derivation ending at {}", end))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = parse_args()?;
    let config = &*CONFIG;
    debug!("configuration: {:?}", config);

    let reader = BufReader::new(
        File::open(&args.instance)
            .with_context(|| format!("opening instance {}", args.instance.display()))?,
    );
    let instance: Instance = serde_json::from_reader(reader)
        .with_context(|| format!("reading instance {}", args.instance.display()))?;

    info!(
        "instance: {} tokens, {} candidate derivations",
        instance.sentence.len(),
        instance.candidates.len()
    );

    let vocab = ModelVocab::new(instance.sentence.iter().cloned(), instance.labels());
    let model = Model::new_random(
        config.model.hidden,
        config.model.embedding,
        vocab,
        config.model.seed,
    );
    let unary_limit = config.parser.unary_limit;

    let mut oracles = Parser::new();
    let axiom = oracles.axiom(&model, &LabelFeatures, &instance.sentence);
    let oracle_end = oracles
        .replay(&model, &LabelFeatures, axiom, &instance.oracle, unary_limit)
        .context("replaying oracle derivation")?;

    let mut candidates = Parser::new();
    let axiom = candidates.axiom(&model, &LabelFeatures, &instance.sentence);
    let mut candidate_ends = Vec::with_capacity(instance.candidates.len());
    for (i, script) in instance.candidates.iter().enumerate() {
        let end = candidates
            .replay(&model, &LabelFeatures, axiom, script, unary_limit)
            .with_context(|| format!("replaying candidate {}", i))?;
        candidate_ends.push(end);
    }

    let step = candidate_ends
        .iter()
        .map(|&end| candidates.state(end).step)
        .chain(std::iter::once(oracles.state(oracle_end).step))
        .max()
        .unwrap_or(0);
    pad_all(&mut oracles, &model, &[oracle_end], step)?;
    pad_all(&mut candidates, &model, &candidate_ends, step)?;

    let mut backward = Backward::new();
    let objective = MarginEvalb::new()
        .margin(&candidates, &oracles, &config.objective, &mut backward)
        .context("computing margin objective")?;

    for &id in candidates.agenda().bucket(step) {
        info!(
            "candidate {}: score {:.4}, loss {:.6}",
            id,
            candidates.state(id).score,
            backward.loss(id)
        );
    }
    info!("objective {:.6}", objective);

    if let Some(dir) = args.save {
        model
            .save(&dir)
            .with_context(|| format!("saving model to {}", dir.display()))?;
        info!("model saved to {}", dir.display());
    }

    Ok(())
}
