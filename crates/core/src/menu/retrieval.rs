//! Candidate retrieval: score every synonym phrase against the utterance and keep the
//! best-matching menu items and options.
//!
//! For a phrase of `n` tokens the utterance is scanned with windows of `n` tokens
//! (or the whole utterance when it is shorter) and each window scores
//! `weight * matched / max(phrase_tokens, window_tokens)` using token-set overlap.
//! A target keeps its best phrase score and the union of phrases that matched at all.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::menu::{MenuCandidate, SynonymEntry, SynonymTarget};
use crate::menu::index::MenuIndex;
use crate::text::tokenize;

pub const DEFAULT_TOP_K: usize = 8;

#[derive(Debug)]
struct TargetScore {
    score: f64,
    winning_phrase_tokens: usize,
    synonyms_matched: BTreeSet<String>,
}

/// Deterministic, infallible; returns at most `top_k` candidates.
pub fn retrieve(utterance: &str, index: &MenuIndex, top_k: usize) -> Vec<MenuCandidate> {
    let utterance_tokens = tokenize(utterance);
    if utterance_tokens.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut per_target: BTreeMap<&SynonymTarget, TargetScore> = BTreeMap::new();
    for synonym in index.synonyms() {
        let score = phrase_score(synonym, &utterance_tokens);
        if score <= 0.0 {
            continue;
        }

        let entry = per_target.entry(&synonym.target).or_insert_with(|| TargetScore {
            score,
            winning_phrase_tokens: synonym.tokens.len(),
            synonyms_matched: BTreeSet::new(),
        });
        let better = score > entry.score
            || (score == entry.score && synonym.tokens.len() < entry.winning_phrase_tokens);
        if better {
            entry.score = score;
            entry.winning_phrase_tokens = synonym.tokens.len();
        }
        entry.synonyms_matched.insert(synonym.phrase.clone());
    }

    let mut candidates = per_target
        .into_iter()
        .filter_map(|(target, scored)| candidate_for(index, target, scored))
        .collect::<Vec<_>>();

    candidates.sort_by(rank_order);
    candidates.truncate(top_k);
    candidates
}

fn phrase_score(synonym: &SynonymEntry, utterance_tokens: &[String]) -> f64 {
    let phrase_tokens = synonym.tokens.iter().map(String::as_str).collect::<BTreeSet<_>>();
    let window_len = synonym.tokens.len().min(utterance_tokens.len());
    let denominator = synonym.tokens.len().max(window_len) as f64;

    utterance_tokens
        .windows(window_len)
        .map(|window| {
            let window_set = window.iter().map(String::as_str).collect::<BTreeSet<_>>();
            let matched = phrase_tokens.intersection(&window_set).count();
            synonym.weight * (matched as f64 / denominator)
        })
        .fold(0.0, f64::max)
}

fn candidate_for(
    index: &MenuIndex,
    target: &SynonymTarget,
    scored: TargetScore,
) -> Option<MenuCandidate> {
    let (name, category, base_price) = match target {
        SynonymTarget::Item(id) => {
            let entry = index.item(id)?;
            (entry.name.clone(), entry.category.clone(), entry.base_price)
        }
        SynonymTarget::Option(id) => {
            let (group, option) = index.option(id)?;
            (option.name.clone(), group.name.clone(), option.price_delta)
        }
    };

    Some(MenuCandidate {
        target: target.clone(),
        name,
        category,
        base_price,
        synonyms_matched: scored.synonyms_matched.into_iter().collect(),
        score: scored.score,
        winning_phrase_tokens: scored.winning_phrase_tokens,
    })
}

/// Score descending, then fewer tokens in the winning phrase, then id.
fn rank_order(left: &MenuCandidate, right: &MenuCandidate) -> Ordering {
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left.winning_phrase_tokens.cmp(&right.winning_phrase_tokens))
        .then_with(|| left.target.id().cmp(right.target.id()))
}
