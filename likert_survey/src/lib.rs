mod catalog;
mod config;
pub mod builder;
pub mod export;
pub mod gate;
pub mod link;
pub mod manual;
pub mod session;

use log::{debug, info};

use std::collections::HashMap;

pub use crate::catalog::Catalog;
pub use crate::config::*;

// **** Private structures ****

// Running total of the scores of one block.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
struct ScoreTally {
    total: u32,
    count: u32,
}

impl ScoreTally {
    fn add(&mut self, score: u8) {
        self.total += score as u32;
        self.count += 1;
    }

    // None when nothing was scored, so that empty blocks never divide by zero.
    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total as f64 / self.count as f64)
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The direction-corrected score of an answer.
///
/// Reversed items are scored (min + max) - answer, so 1 becomes 5 and 3 stays 3.
/// "Not applicable" has no score.
pub fn score_item(item: &Item, answer: Answer) -> Option<u8> {
    match answer {
        Answer::NotApplicable => None,
        Answer::Scale(x) if item.reversed => Some(SCALE_MIN + SCALE_MAX - x),
        Answer::Scale(x) => Some(x),
    }
}

/// Scores the answers of one respondent.
///
/// Arguments:
/// * `catalog` the items of the questionnaire
/// * `response` the answers collected for these items
///
/// Unanswered and "not applicable" items are left out of all the means. Blocks
/// without any scored item are not reported. The blocks are ordered by increasing
/// mean, the weakest dimension first; equal means keep the catalog order.
pub fn score_responses(catalog: &Catalog, response: &Response) -> ScoreSummary {
    info!(
        "score_responses: processing {} answers for {} items",
        response.len(),
        catalog.len()
    );

    let mut overall = ScoreTally::default();
    let mut by_block: HashMap<&str, ScoreTally> = HashMap::new();
    let mut items: Vec<ScoredResponse> = Vec::new();

    for item in catalog.items() {
        let raw_answer = response.get(&item.id);
        let score = raw_answer.and_then(|a| score_item(item, a));
        if let Some(s) = score {
            overall.add(s);
            by_block.entry(item.block.as_str()).or_default().add(s);
        }
        debug!(
            "score_responses: {} raw: {:?} score: {:?}",
            item.id, raw_answer, score
        );
        items.push(ScoredResponse {
            block: item.block.clone(),
            item_id: item.id.clone(),
            text: item.text.clone(),
            raw_answer,
            score,
        });
    }

    let mut blocks: Vec<BlockSummary> = catalog
        .blocks()
        .iter()
        .filter_map(|b| {
            by_block
                .get(b.as_str())
                .and_then(|t| t.mean())
                .map(|m| BlockSummary {
                    block: b.clone(),
                    mean: round2(m),
                })
        })
        .collect();
    // sort_by is stable: ties stay in catalog order.
    blocks.sort_by(|a, b| a.mean.total_cmp(&b.mean));

    let overall_mean = overall.mean().unwrap_or(0.0);
    info!(
        "score_responses: overall mean {:.2} over {} scored items, {} blocks",
        overall_mean,
        overall.count,
        blocks.len()
    );

    ScoreSummary {
        overall_mean,
        blocks,
        items,
    }
}
