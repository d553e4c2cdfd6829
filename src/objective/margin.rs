// src/objective/margin.rs

use std::collections::HashSet;
use std::fmt::Debug;

use log::debug;

use super::{Backward, LogWeight, Margin, ObjectiveOptions};
use crate::error::ObjectiveError;
use crate::parser::{Parser, StateId};
use crate::span::Span;
use crate::symbol::Symbol;

type Constituents = HashSet<(Symbol, Span)>;

/// Expected labeled-bracket F-measure margin.
///
/// Every candidate in the last comparable step is scored by its best
/// F-measure against any oracle hypothesis. The objective is the negated
/// expectation of that score under the softmax of the scaled model scores;
/// each candidate receives `-(f - E[f]) * p` as its loss.
#[derive(Debug, Default)]
pub struct MarginEvalb {
    oracles: Vec<Constituents>,
    candidate: Constituents,
    scores: Vec<f64>,
    margins: Vec<f64>,
}

impl MarginEvalb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labeled spans of the non-binarized REDUCE and UNARY states on the
    /// derivation chain ending at `state`.
    fn collect<S>(parser: &Parser<S>, state: StateId, constituents: &mut Constituents)
    where
        S: Clone + Default + Debug,
    {
        constituents.clear();
        for (_, s) in parser.derivation(state) {
            if s.operation.is_constituent() && !s.label.is_binarized() {
                constituents.insert((s.label.clone(), s.span));
            }
        }
    }

    fn f_measure(candidate: &Constituents, oracle: &Constituents) -> f64 {
        if candidate.is_empty() || oracle.is_empty() {
            return 0.0;
        }
        let matched = candidate.iter().filter(|c| oracle.contains(*c)).count() as f64;
        let precision = matched / candidate.len() as f64;
        let recall = matched / oracle.len() as f64;
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

/// Last step with states in both agendas, if any after the axiom.
fn step_back<S>(candidates: &Parser<S>, oracles: &Parser<S>) -> Option<usize>
where
    S: Clone + Default + Debug,
{
    let last = candidates.agenda().len().checked_sub(1)?;
    (1..=last).rev().find(|&step| {
        !candidates.agenda().bucket(step).is_empty() && !oracles.agenda().bucket(step).is_empty()
    })
}

impl Margin for MarginEvalb {
    fn margin<S>(
        &mut self,
        candidates: &Parser<S>,
        oracles: &Parser<S>,
        options: &ObjectiveOptions,
        backward: &mut Backward,
    ) -> Result<f64, ObjectiveError>
    where
        S: Clone + Default + Debug,
    {
        if candidates.agenda().len() != oracles.agenda().len() {
            return Err(ObjectiveError::AgendaMismatch {
                candidate: candidates.agenda().len(),
                oracle: oracles.agenda().len(),
            });
        }

        let Some(step) = step_back(candidates, oracles) else {
            debug!("no comparable step; objective is zero");
            return Ok(0.0);
        };

        let kbest_candidates = candidates.agenda().bucket(step);
        let kbest_oracles = oracles.agenda().bucket(step);

        self.oracles.resize_with(kbest_oracles.len(), Constituents::default);
        for (set, &oracle) in self.oracles.iter_mut().zip(kbest_oracles) {
            Self::collect(oracles, oracle, set);
        }

        self.scores.clear();
        for &candidate in kbest_candidates {
            Self::collect(candidates, candidate, &mut self.candidate);
            let best = self
                .oracles
                .iter()
                .map(|oracle| Self::f_measure(&self.candidate, oracle))
                .fold(0.0, f64::max);
            self.scores.push(best);
        }

        self.margins.clear();
        self.margins.extend(
            kbest_candidates
                .iter()
                .map(|&c| candidates.state(c).score * options.scale),
        );
        let z: LogWeight = self.margins.iter().map(|&m| LogWeight::exp(m)).sum();

        let probs: Vec<f64> = self
            .margins
            .iter()
            .map(|&m| (LogWeight::exp(m) / z).value())
            .collect();
        let expectation: f64 = self.scores.iter().zip(&probs).map(|(s, p)| s * p).sum();
        let objective = -expectation;

        let mut attributed = 0;
        for ((&state, &score), &prob) in kbest_candidates.iter().zip(&self.scores).zip(&probs) {
            let loss = -(score - expectation) * prob;
            if loss == 0.0 {
                continue;
            }
            backward.accumulate(state, candidates.state(state).step, loss);
            attributed += 1;
        }

        debug!(
            "margin at step {}: {} candidates, {} oracles, expectation {:.4}, {} states attributed",
            step,
            kbest_candidates.len(),
            kbest_oracles.len(),
            expectation,
            attributed
        );

        Ok(objective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{LabelContext, LabelFeatures};
    use crate::model::{Model, ModelVocab};
    use crate::parser::Transition;

    const UNARY_LIMIT: usize = 3;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    fn model() -> Model {
        let vocab = ModelVocab::new(
            ["the", "dog", "barks"].map(sym),
            ["S", "NP", "VP", "DT", "NN", "VBZ", "NP^"].map(sym),
        );
        Model::new_random(4, 3, vocab, 21)
    }

    fn shift(label: &str) -> Transition {
        Transition::Shift { label: sym(label) }
    }

    fn reduce(label: &str) -> Transition {
        Transition::Reduce { label: sym(label) }
    }

    fn unary(label: &str) -> Transition {
        Transition::Unary { label: sym(label) }
    }

    /// Parses `sentence` once per script, each from the same axiom.
    fn run(model: &Model, sentence: &str, scripts: &[Vec<Transition>]) -> Parser<LabelContext> {
        let input: Vec<Symbol> = sentence.split_whitespace().map(sym).collect();
        let mut parser = Parser::new();
        let axiom = parser.axiom(model, &LabelFeatures, &input);
        for script in scripts {
            parser
                .replay(model, &LabelFeatures, axiom, script, UNARY_LIMIT)
                .unwrap();
        }
        parser
    }

    fn gold() -> Vec<Transition> {
        vec![
            shift("DT"),
            shift("NN"),
            reduce("NP"),
            shift("VBZ"),
            unary("VP"),
            reduce("S"),
            Transition::Final,
        ]
    }

    #[test_log::test]
    fn identical_single_hypotheses_give_minus_one() {
        let model = model();
        let oracle = run(&model, "the dog barks", &[gold()]);
        let candidate = run(&model, "the dog barks", &[gold()]);

        let mut backward = Backward::new();
        let objective = MarginEvalb::new()
            .margin(&candidate, &oracle, &ObjectiveOptions::default(), &mut backward)
            .unwrap();

        assert_eq!(objective, -1.0);
        assert!(backward.is_empty());
    }

    #[test_log::test]
    fn agenda_length_mismatch_is_an_error() {
        let model = model();
        let oracle = run(&model, "the dog barks", &[gold()]);
        let mut short = gold();
        short.pop();
        let candidate = run(&model, "the dog barks", &[short]);

        let mut backward = Backward::new();
        let err = MarginEvalb::new()
            .margin(&candidate, &oracle, &ObjectiveOptions::default(), &mut backward)
            .unwrap_err();

        assert_eq!(
            err,
            ObjectiveError::AgendaMismatch {
                candidate: 7,
                oracle: 8
            }
        );
        assert!(backward.is_empty());
    }

    #[test_log::test]
    fn axiom_only_agendas_give_zero() {
        let model = model();
        let oracle = run(&model, "the dog", &[]);
        let candidate = run(&model, "the dog", &[]);
        let mut backward = Backward::new();
        let objective = MarginEvalb::new()
            .margin(&candidate, &oracle, &ObjectiveOptions::default(), &mut backward)
            .unwrap();
        assert_eq!(objective, 0.0);
    }

    #[test_log::test]
    fn competing_candidates_split_the_loss() {
        let model = model();
        let wrong = vec![
            shift("DT"),
            shift("NN"),
            shift("VBZ"),
            unary("VP"),
            reduce("NP^"),
            reduce("S"),
            Transition::Final,
        ];
        let oracle = run(&model, "the dog barks", &[gold()]);
        let candidate = run(&model, "the dog barks", &[gold(), wrong]);

        let step = candidate.agenda().len() - 1;
        let finals = candidate.agenda().bucket(step).to_vec();
        assert_eq!(finals.len(), 2);

        let options = ObjectiveOptions { scale: 0.5 };
        let mut backward = Backward::new();
        let mut margin = MarginEvalb::new();
        let objective = margin
            .margin(&candidate, &oracle, &options, &mut backward)
            .unwrap();

        // Gold has F = 1. The other finds S and VP out of {NP, VP, S}: F = 0.8.
        let scores = [1.0, 0.8];
        let margins: Vec<f64> = finals
            .iter()
            .map(|&id| candidate.state(id).score * options.scale)
            .collect();
        let z: f64 = margins.iter().map(|m| m.exp()).sum();
        let probs: Vec<f64> = margins.iter().map(|m| m.exp() / z).collect();
        let expectation = scores[0] * probs[0] + scores[1] * probs[1];

        assert!((objective + expectation).abs() < 1e-9);
        assert_eq!(backward.len(), 2);
        for (i, &id) in finals.iter().enumerate() {
            let expected = -(scores[i] - expectation) * probs[i];
            assert!((backward.loss(id) - expected).abs() < 1e-9);
        }
        // The gold derivation is pushed up, the wrong one down.
        assert!(backward.loss(finals[0]) < 0.0);
        assert!(backward.loss(finals[1]) > 0.0);
        assert_eq!(backward.states(step).collect::<Vec<_>>(), finals);
        assert!((backward.loss(finals[0]) + backward.loss(finals[1])).abs() < 1e-9);
    }

    #[test]
    fn f_measure_guards_empty_sets() {
        let empty = Constituents::new();
        let one: Constituents = [(sym("NP"), Span::new(0, 2))].into_iter().collect();
        assert_eq!(MarginEvalb::f_measure(&empty, &one), 0.0);
        assert_eq!(MarginEvalb::f_measure(&one, &empty), 0.0);
        assert_eq!(MarginEvalb::f_measure(&one, &one), 1.0);

        let other: Constituents = [(sym("VP"), Span::new(0, 2))].into_iter().collect();
        assert_eq!(MarginEvalb::f_measure(&one, &other), 0.0);
    }
}
